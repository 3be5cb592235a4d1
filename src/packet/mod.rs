//! Packet Module
//!
//! The serializable unit exchanged over a connection.
//!
//! Every packet kind has a fixed identity `(stage, direction, id)`, a
//! `write_data` that lays its fields out in a fixed order, a `read_data`
//! that consumes exactly those bytes, and a `dispatch` that routes the
//! decoded value into one method of the handler capability for its
//! (stage, receiving role).
//!
//! ## Built-in kinds
//! | Stage     | Dir | Id | Packet                |
//! |-----------|-----|----|-----------------------|
//! | handshake | C→S | 0  | `Hello`               |
//! | handshake | S→C | 0  | `HelloAccepted`       |
//! | handshake | S→C | 1  | `HelloRejected`       |
//! | login     | C→S | 0  | `LoginRequest`        |
//! | login     | S→C | 0  | `LoginAccepted`       |
//! | login     | S→C | 1  | `LoginRejected`       |
//! | session   | C→S | 0  | `ClientKeepAlive`     |
//! | session   | C→S | 1  | `ChatMessage`         |
//! | session   | C→S | 2  | `ApplyRegionAction`   |
//! | session   | S→C | 0  | `ServerKeepAlive`     |
//! | session   | S→C | 1  | `ChatBroadcast`       |
//! | session   | S→C | 2  | `Disconnect`          |
//! | session   | S→C | 3  | `RegionActionApplied` |

use std::any::Any;
use std::fmt::Debug;

use crate::error::{HearthError, Result};
use crate::handler::{PacketContext, PacketHandler};
use crate::protocol::{Direction, ProtocolTables, Stage};
use crate::wire::{WireReader, WireWriter};

/// Implements the identity part of `Packet` from the type's `PacketKind` consts
macro_rules! packet_identity {
    () => {
        fn stage(&self) -> $crate::protocol::Stage {
            <Self as $crate::packet::PacketKind>::STAGE
        }

        fn direction(&self) -> $crate::protocol::Direction {
            <Self as $crate::packet::PacketKind>::DIRECTION
        }

        fn id(&self) -> u8 {
            <Self as $crate::packet::PacketKind>::ID
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }
    };
}

mod handshake;
mod login;
mod region;
mod session;

pub use handshake::{Hello, HelloAccepted, HelloRejected};
pub use login::{LoginAccepted, LoginRejected, LoginRequest};
pub use region::{decode_action_boxed, ActionKind, Clear, Fill, RegionAction, RegionPos, SetTile};
pub use session::{
    ApplyRegionAction, ChatBroadcast, ChatMessage, ClientKeepAlive, Disconnect,
    RegionActionApplied, ServerKeepAlive,
};

/// Object-safe side of a packet, used after decode and when sending
pub trait Packet: Debug + Send + Any {
    fn stage(&self) -> Stage;

    fn direction(&self) -> Direction;

    fn id(&self) -> u8;

    /// Serialize the body (no header) in the kind's fixed field order
    fn write_data(&self, out: &mut WireWriter) -> Result<()>;

    /// Route this packet into the matching capability method of `handler`
    ///
    /// Fails with `UnsupportedPacket` if `handler` does not expose the
    /// capability this packet needs.
    fn dispatch(self: Box<Self>, handler: &mut dyn PacketHandler, ctx: &mut PacketContext<'_>)
        -> Result<()>;

    /// Stage the receiving connection enters once this packet is handled
    fn advances_to(&self) -> Option<Stage> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Static side of a packet: its identity and how to read it back
pub trait PacketKind: Packet + Sized {
    const STAGE: Stage;
    const DIRECTION: Direction;
    const ID: u8;

    /// Read the body produced by `write_data`
    fn read_data(reader: &mut WireReader<'_>, tables: &ProtocolTables) -> Result<Self>;
}

/// Registry decoder for any packet kind
pub fn decode_boxed<P: PacketKind>(
    reader: &mut WireReader<'_>,
    tables: &ProtocolTables,
) -> Result<Box<dyn Packet>> {
    Ok(Box::new(P::read_data(reader, tables)?))
}

/// Error for a handler that lacks the capability `packet` needs
pub(crate) fn unsupported(packet: &dyn Packet) -> HearthError {
    HearthError::UnsupportedPacket {
        stage: packet.stage(),
        direction: packet.direction(),
        id: packet.id(),
    }
}

impl dyn Packet {
    /// Downcast to a concrete packet kind
    pub fn downcast_ref<P: Packet>(&self) -> Option<&P> {
        self.as_any().downcast_ref::<P>()
    }
}
