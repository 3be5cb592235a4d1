//! # hearthwire
//!
//! A typed, stage-aware binary packet protocol for client/server game
//! sessions:
//! - Packets identified by (stage, direction, id) with byte-exact layouts
//! - Per-stage id registries, separate for each direction
//! - Strictly ordered, non-overlapping dispatch per connection
//! - Capability-based handler routing (double dispatch)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │                  (one Connection per peer)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     Connection                               │
//! │        reader thread  ◄──── socket ────►  writer thread      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ frame header (stage, direction, id)
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Protocol   │          │   Packet    │
//!   │   Tables    │────────► │  dispatch   │
//!   │ (registry)  │  decode  │ (handler)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wire;
pub mod registry;
pub mod protocol;
pub mod packet;
pub mod handler;
pub mod network;
pub mod lobby;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HearthError, Result};
pub use config::Config;
pub use handler::{PacketContext, PacketHandler};
pub use network::{Connection, ConnectionHandle, Server};
pub use packet::Packet;
pub use protocol::{Direction, ProtocolTables, Role, Stage};
pub use registry::TypeRegistry;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hearthwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
