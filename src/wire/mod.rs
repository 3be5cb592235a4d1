//! Wire Module
//!
//! Sequential, byte-exact binary cursor used by every packet body.
//!
//! ## Encoding
//! - Integers: fixed width, big-endian
//! - `bool`: one byte, `0x00` or `0x01`
//! - Strings: `u16` length prefix + UTF-8 bytes
//! - Blobs: `u16` length prefix + raw bytes
//!
//! ```text
//! ┌──────────┬──────────────────────────────┐
//! │ Len (2)  │      UTF-8 / raw bytes       │
//! └──────────┴──────────────────────────────┘
//! ```
//!
//! There is no framing here: a reader consumes exactly what the matching
//! writer produced and nothing more.

mod reader;
mod writer;

pub use reader::WireReader;
pub use writer::WireWriter;

/// Default upper bound for strings and blobs read off the wire
pub const DEFAULT_MAX_STRING_LEN: usize = 4096;
