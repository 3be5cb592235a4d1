//! Protocol Module
//!
//! Stage-scoped id namespaces and the frame format.
//!
//! ## Frame Format
//! ```text
//! ┌───────────┬───────────┬──────────┬─────────────────────────────┐
//! │ Stage (1) │  Dir (1)  │  Id (1)  │  Body (packet-defined)      │
//! └───────────┴───────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! There is no length prefix. A body ends where its packet's layout says it
//! ends, so every packet's reader must consume exactly what its writer wrote.
//!
//! ### Stages
//! - 0x00: HANDSHAKE
//! - 0x01: LOGIN
//! - 0x02: SESSION
//!
//! ### Directions
//! - 0x00: client → server
//! - 0x01: server → client
//!
//! The same id means different things in each (stage, direction) pair.

mod frame;
mod stage;
mod tables;

pub use frame::{
    decode_frame, encode_frame, encode_frame_with_limit, read_frame, FrameHeader, HEADER_SIZE,
};
pub use stage::{Direction, Role, Stage};
pub use tables::{ActionRegistry, PacketRegistry, ProtocolTables};
