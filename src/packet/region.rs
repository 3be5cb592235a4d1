//! Region actions
//!
//! Edits to a world region, carried as a nested `[action id][body]` inside
//! session packets. They are decoded through their own registry so new
//! action kinds never touch the packet code that carries them.
//!
//! The core does not interpret actions; it only moves them between peers.

use std::any::Any;
use std::fmt::Debug;

use crate::error::Result;
use crate::wire::{WireReader, WireWriter};

/// Implements the identity part of `RegionAction` from the type's `ActionKind`
macro_rules! action_identity {
    () => {
        fn id(&self) -> u8 {
            <Self as ActionKind>::ID
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn dyn_eq(&self, other: &dyn RegionAction) -> bool {
            other
                .as_any()
                .downcast_ref::<Self>()
                .map_or(false, |other| other == self)
        }
    };
}

/// Coordinates of a region in the world grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn write(&self, out: &mut WireWriter) {
        out.write_i32(self.x);
        out.write_i32(self.z);
    }

    pub fn read(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            x: reader.read_i32()?,
            z: reader.read_i32()?,
        })
    }
}

/// Object-safe side of a region action
pub trait RegionAction: Debug + Send + Any {
    fn id(&self) -> u8;

    fn write_data(&self, out: &mut WireWriter) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    /// Field equality against another action of any kind
    fn dyn_eq(&self, other: &dyn RegionAction) -> bool;
}

impl PartialEq for dyn RegionAction {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

// Works around rust-lang/rust#31740 so `Box<dyn RegionAction>` values can be
// compared in place without moving out of a borrow
impl PartialEq<&Self> for Box<dyn RegionAction> {
    fn eq(&self, other: &&Self) -> bool {
        self.dyn_eq(other.as_ref())
    }
}

/// Static side of a region action
pub trait ActionKind: RegionAction + PartialEq + Sized {
    const ID: u8;

    fn read_data(reader: &mut WireReader<'_>) -> Result<Self>;
}

/// Registry decoder for any action kind
pub fn decode_action_boxed<A: ActionKind>(
    reader: &mut WireReader<'_>,
    _ctx: &(),
) -> Result<Box<dyn RegionAction>> {
    Ok(Box::new(A::read_data(reader)?))
}

/// Set one tile inside the region
///
/// Payload: x (1) + y (1) + tile (2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTile {
    pub x: u8,
    pub y: u8,
    pub tile: u16,
}

impl RegionAction for SetTile {
    action_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u8(self.x);
        out.write_u8(self.y);
        out.write_u16(self.tile);
        Ok(())
    }
}

impl ActionKind for SetTile {
    const ID: u8 = 0x00;

    fn read_data(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            x: reader.read_u8()?,
            y: reader.read_u8()?,
            tile: reader.read_u16()?,
        })
    }
}

/// Fill the whole region with one tile
///
/// Payload: tile (2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub tile: u16,
}

impl RegionAction for Fill {
    action_identity!();

    fn write_data(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u16(self.tile);
        Ok(())
    }
}

impl ActionKind for Fill {
    const ID: u8 = 0x01;

    fn read_data(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            tile: reader.read_u16()?,
        })
    }
}

/// Reset the region to empty
///
/// Payload: empty
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clear;

impl RegionAction for Clear {
    action_identity!();

    fn write_data(&self, _out: &mut WireWriter) -> Result<()> {
        Ok(())
    }
}

impl ActionKind for Clear {
    const ID: u8 = 0x02;

    fn read_data(_reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self)
    }
}
