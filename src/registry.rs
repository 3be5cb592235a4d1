//! Type Registry
//!
//! Generic `id → decoder` table for any family of values that travel on the
//! wire as `[id][body]`.
//!
//! A registry is filled once during startup and then shared read-only
//! (usually behind an `Arc`). Decoders return fully formed values, so there
//! is no empty instance that later gets populated.

use std::collections::HashMap;
use std::fmt;

use crate::error::{HearthError, Result};
use crate::wire::WireReader;

/// Builds one value of the family from the bytes following its id
///
/// `C` is read-only context the decoder may need, such as a nested registry.
pub type Decoder<T, C> = fn(&mut WireReader<'_>, &C) -> Result<Box<T>>;

/// Maps small integer ids to decoders for one namespace
pub struct TypeRegistry<T: ?Sized, C: ?Sized = ()> {
    /// Label used in error messages (e.g. `login/client->server`)
    namespace: String,

    decoders: HashMap<u8, Decoder<T, C>>,
}

impl<T: ?Sized, C: ?Sized> TypeRegistry<T, C> {
    /// Create an empty registry
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            decoders: HashMap::new(),
        }
    }

    /// Bind `id` to `decoder`
    ///
    /// Fails with `DuplicateId` if `id` is already bound; the existing
    /// binding is left untouched.
    pub fn register(&mut self, id: u8, decoder: Decoder<T, C>) -> Result<()> {
        if self.decoders.contains_key(&id) {
            return Err(HearthError::DuplicateId {
                namespace: self.namespace.clone(),
                id,
            });
        }
        self.decoders.insert(id, decoder);
        tracing::trace!("Registered id {} in '{}'", id, self.namespace);
        Ok(())
    }

    /// Decode the value bound to `id` from `reader`
    pub fn create(&self, id: u8, reader: &mut WireReader<'_>, ctx: &C) -> Result<Box<T>> {
        let decoder = self.decoders.get(&id).ok_or_else(|| HearthError::UnknownId {
            namespace: self.namespace.clone(),
            id,
        })?;
        decoder(reader, ctx)
    }

    pub fn contains(&self, id: u8) -> bool {
        self.decoders.contains_key(&id)
    }

    /// All bound ids in ascending order
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self.decoders.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl<T: ?Sized, C: ?Sized> fmt::Debug for TypeRegistry<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("namespace", &self.namespace)
            .field("ids", &self.ids())
            .finish()
    }
}
