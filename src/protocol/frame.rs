//! Frame codec
//!
//! A frame is one packet on the wire: a three byte header followed by the
//! packet body exactly as its `write_data` produced it.
//!
//! ```text
//! ┌───────────┬───────────┬──────────┬─────────────────────────────┐
//! │ Stage (1) │  Dir (1)  │  Id (1)  │  Body (packet-defined)      │
//! └───────────┴───────────┴──────────┴─────────────────────────────┘
//! ```

use bytes::Bytes;

use crate::error::{HearthError, Result};
use crate::packet::Packet;
use crate::wire::{WireReader, WireWriter, DEFAULT_MAX_STRING_LEN};

use super::{Direction, ProtocolTables, Stage};

/// Header size: stage (1) + direction (1) + packet id (1)
pub const HEADER_SIZE: usize = 3;

/// Identity of the packet that follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub stage: Stage,
    pub direction: Direction,
    pub id: u8,
}

impl FrameHeader {
    pub fn of(packet: &dyn Packet) -> Self {
        Self {
            stage: packet.stage(),
            direction: packet.direction(),
            id: packet.id(),
        }
    }

    pub fn write(&self, out: &mut WireWriter) {
        out.write_u8(self.stage as u8);
        out.write_u8(self.direction as u8);
        out.write_u8(self.id);
    }

    /// Read a header, or `None` if the stream ends cleanly before one starts
    pub fn read(reader: &mut WireReader<'_>) -> Result<Option<Self>> {
        let stage_byte = match reader.read_u8_or_eof()? {
            Some(byte) => byte,
            None => return Ok(None),
        };
        let stage = Stage::from_u8(stage_byte).ok_or_else(|| {
            HearthError::MalformedPacket(format!("unknown stage byte 0x{:02x}", stage_byte))
        })?;

        let direction_byte = reader.read_u8()?;
        let direction = Direction::from_u8(direction_byte).ok_or_else(|| {
            HearthError::MalformedPacket(format!(
                "unknown direction byte 0x{:02x}",
                direction_byte
            ))
        })?;

        let id = reader.read_u8()?;

        Ok(Some(Self {
            stage,
            direction,
            id,
        }))
    }
}

/// Serialize a packet into one complete frame, with the default string limit
pub fn encode_frame(packet: &dyn Packet) -> Result<Bytes> {
    encode_frame_with_limit(packet, DEFAULT_MAX_STRING_LEN)
}

/// Serialize a packet, refusing strings a peer limited to `max_string_len` would reject
pub fn encode_frame_with_limit(packet: &dyn Packet, max_string_len: usize) -> Result<Bytes> {
    let mut out = WireWriter::with_limit(max_string_len);
    FrameHeader::of(packet).write(&mut out);
    packet.write_data(&mut out)?;
    Ok(out.finish())
}

/// Read the next frame from a stream, or `None` at a clean end of stream
///
/// The frame is decoded against whatever table its own header names;
/// connections check the header against their state before trusting it.
pub fn read_frame(
    tables: &ProtocolTables,
    reader: &mut WireReader<'_>,
) -> Result<Option<Box<dyn Packet>>> {
    match FrameHeader::read(reader)? {
        Some(header) => tables
            .decode(header.stage, header.direction, header.id, reader)
            .map(Some),
        None => Ok(None),
    }
}

/// Decode exactly one frame held in memory
pub fn decode_frame(tables: &ProtocolTables, bytes: &[u8]) -> Result<Box<dyn Packet>> {
    let mut source = bytes;
    let mut reader = WireReader::new(&mut source);

    let packet = read_frame(tables, &mut reader)?
        .ok_or_else(|| HearthError::truncated("frame header"))?;

    if reader.consumed() != bytes.len() {
        return Err(HearthError::MalformedPacket(format!(
            "{} trailing bytes after {:?}",
            bytes.len() - reader.consumed(),
            FrameHeader::of(&*packet)
        )));
    }

    Ok(packet)
}
