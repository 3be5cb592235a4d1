//! Error types for hearthwire
//!
//! Provides a unified error type for registry, codec and connection operations.

use thiserror::Error;

use crate::protocol::{Direction, Stage};

/// Result type alias using HearthError
pub type Result<T> = std::result::Result<T, HearthError>;

/// Unified error type for hearthwire operations
#[derive(Debug, Error)]
pub enum HearthError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("Duplicate id {id} in registry '{namespace}'")]
    DuplicateId { namespace: String, id: u8 },

    #[error("Unknown id {id} in registry '{namespace}'")]
    UnknownId { namespace: String, id: u8 },

    // -------------------------------------------------------------------------
    // Packet Errors
    // -------------------------------------------------------------------------
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Unsupported packet {stage:?}/{direction:?}#{id}: handler lacks the required capability")]
    UnsupportedPacket {
        stage: Stage,
        direction: Direction,
        id: u8,
    },

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error(
        "Unexpected frame {stage:?}/{direction:?}, connection expects {expected_stage:?}/{expected_direction:?}"
    )]
    UnexpectedFrame {
        expected_stage: Stage,
        expected_direction: Direction,
        stage: Stage,
        direction: Direction,
    },

    #[error("Cannot send {direction:?} packet #{id} from this side of the connection")]
    WrongDirection { direction: Direction, id: u8 },

    #[error("Connection closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HearthError {
    /// Shorthand for a truncated read inside a packet body
    pub(crate) fn truncated(what: &str) -> Self {
        HearthError::MalformedPacket(format!("truncated while reading {}", what))
    }
}
