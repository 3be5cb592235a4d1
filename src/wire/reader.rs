//! Wire Reader
//!
//! Pulls primitives straight from a byte stream.

use std::io::{ErrorKind, Read};

use crate::error::{HearthError, Result};

use super::DEFAULT_MAX_STRING_LEN;

/// Reads primitives from any `Read` source
///
/// Short reads become `MalformedPacket`; every other I/O error is passed
/// through untouched so the connection can tell a timeout from bad bytes.
pub struct WireReader<'a> {
    inner: &'a mut dyn Read,
    max_string_len: usize,
    consumed: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(inner: &'a mut dyn Read) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_STRING_LEN)
    }

    /// Create a reader rejecting strings and blobs longer than `max_string_len`
    pub fn with_limit(inner: &'a mut dyn Read, max_string_len: usize) -> Self {
        Self {
            inner,
            max_string_len,
            consumed: 0,
        }
    }

    /// Bytes consumed so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn fill(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.consumed += buf.len();
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(HearthError::truncated(what)),
            Err(e) => Err(HearthError::Io(e)),
        }
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf, what)?;
        Ok(buf)
    }

    /// Read one byte, or `None` if the source is exhausted before it
    ///
    /// Used at frame boundaries, where end of stream is a clean disconnect.
    pub fn read_u8_or_eof(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.consumed += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HearthError::Io(e)),
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>("u8")?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array("u16")?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array("u32")?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array("u64")?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array("i32")?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array("i64")?))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(HearthError::MalformedPacket(format!(
                "invalid bool byte 0x{:02x}",
                other
            ))),
        }
    }

    /// Read a length-prefixed byte blob
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u16()? as usize;
        if len > self.max_string_len {
            return Err(HearthError::MalformedPacket(format!(
                "field of {} bytes exceeds limit of {}",
                len, self.max_string_len
            )));
        }
        let mut buf = vec![0u8; len];
        self.fill(&mut buf, "blob body")?;
        Ok(buf)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| HearthError::MalformedPacket(format!("invalid UTF-8 in string: {}", e)))
    }
}
