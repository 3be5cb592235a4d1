//! Wire Writer
//!
//! Appends primitives to an in-memory frame buffer.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{HearthError, Result};

use super::DEFAULT_MAX_STRING_LEN;

/// Writes primitives into a growable buffer
///
/// Strings and blobs longer than the limit are refused here, so nothing is
/// written that a reader with the same limit would reject.
#[derive(Debug)]
pub struct WireWriter {
    buf: BytesMut,
    max_string_len: usize,
}

impl Default for WireWriter {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_STRING_LEN)
    }
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer refusing strings and blobs longer than `max_string_len`
    pub fn with_limit(max_string_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
            max_string_len,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Freeze the written bytes
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    /// Write a length-prefixed byte blob
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        if value.len() > self.max_string_len {
            return Err(HearthError::MalformedPacket(format!(
                "field of {} bytes exceeds limit of {}",
                value.len(),
                self.max_string_len
            )));
        }
        let len = u16::try_from(value.len()).map_err(|_| {
            HearthError::MalformedPacket(format!(
                "field of {} bytes does not fit a u16 length prefix",
                value.len()
            ))
        })?;
        self.buf.reserve(2 + value.len());
        self.buf.put_u16(len);
        self.buf.put_slice(value);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_bytes(value.as_bytes())
    }
}
