//! Wire Tests
//!
//! Tests for the binary cursor used by packet bodies.

use hearthwire::wire::{WireReader, WireWriter, DEFAULT_MAX_STRING_LEN};
use hearthwire::HearthError;

// =============================================================================
// Primitive Encoding Tests
// =============================================================================

#[test]
fn test_integers_are_big_endian() {
    let mut out = WireWriter::new();
    out.write_u16(0x0102);
    out.write_u32(0x0304_0506);
    out.write_i32(-2);

    assert_eq!(
        out.as_slice(),
        &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xFF, 0xFF, 0xFF, 0xFE]
    );
}

#[test]
fn test_primitives_read_back_in_order() {
    let mut out = WireWriter::new();
    out.write_u8(7);
    out.write_u16(65_000);
    out.write_u32(4_000_000_000);
    out.write_u64(u64::MAX - 1);
    out.write_i32(i32::MIN);
    out.write_i64(-42);
    out.write_bool(true);
    out.write_str("héllo").unwrap();
    out.write_bytes(&[0x00, 0xFF]).unwrap();
    let bytes = out.finish();

    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);

    assert_eq!(reader.read_u8().unwrap(), 7);
    assert_eq!(reader.read_u16().unwrap(), 65_000);
    assert_eq!(reader.read_u32().unwrap(), 4_000_000_000);
    assert_eq!(reader.read_u64().unwrap(), u64::MAX - 1);
    assert_eq!(reader.read_i32().unwrap(), i32::MIN);
    assert_eq!(reader.read_i64().unwrap(), -42);
    assert!(reader.read_bool().unwrap());
    assert_eq!(reader.read_str().unwrap(), "héllo");
    assert_eq!(reader.read_bytes().unwrap(), vec![0x00, 0xFF]);
    assert_eq!(reader.consumed(), bytes.len());
}

#[test]
fn test_string_layout_is_length_prefixed() {
    let mut out = WireWriter::new();
    out.write_str("abc").unwrap();
    assert_eq!(out.as_slice(), &[0x00, 0x03, b'a', b'b', b'c']);
}

#[test]
fn test_empty_string() {
    let mut out = WireWriter::new();
    out.write_str("").unwrap();
    assert_eq!(out.as_slice(), &[0x00, 0x00]);

    let bytes = out.finish();
    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);
    assert_eq!(reader.read_str().unwrap(), "");
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_truncated_integer_is_malformed() {
    let bytes = [0x00, 0x01];
    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);

    match reader.read_u32() {
        Err(HearthError::MalformedPacket(msg)) => assert!(msg.contains("u32")),
        other => panic!("Expected MalformedPacket, got {:?}", other),
    }
}

#[test]
fn test_truncated_string_body_is_malformed() {
    // Claims 10 bytes, carries 3
    let bytes = [0x00, 0x0A, b'a', b'b', b'c'];
    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);

    assert!(matches!(
        reader.read_str(),
        Err(HearthError::MalformedPacket(_))
    ));
}

#[test]
fn test_string_over_limit_is_rejected_before_reading_body() {
    let mut out = WireWriter::new();
    out.write_str("0123456789").unwrap();
    let bytes = out.finish();

    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::with_limit(&mut source, 4);

    match reader.read_str() {
        Err(HearthError::MalformedPacket(msg)) => assert!(msg.contains("exceeds limit")),
        other => panic!("Expected MalformedPacket, got {:?}", other),
    }
    // Only the length prefix was consumed
    assert_eq!(reader.consumed(), 2);
}

#[test]
fn test_invalid_utf8_is_malformed() {
    let bytes = [0x00, 0x02, 0xC3, 0x28];
    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);

    match reader.read_str() {
        Err(HearthError::MalformedPacket(msg)) => assert!(msg.contains("UTF-8")),
        other => panic!("Expected MalformedPacket, got {:?}", other),
    }
}

#[test]
fn test_invalid_bool_is_malformed() {
    let bytes = [0x02];
    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);

    assert!(matches!(
        reader.read_bool(),
        Err(HearthError::MalformedPacket(_))
    ));
}

#[test]
fn test_oversized_blob_cannot_be_written() {
    let mut out = WireWriter::with_limit(usize::MAX);
    let big = vec![0u8; u16::MAX as usize + 1];

    match out.write_bytes(&big) {
        Err(HearthError::MalformedPacket(msg)) => assert!(msg.contains("u16")),
        other => panic!("Expected MalformedPacket, got {:?}", other),
    }
    assert!(out.is_empty());
}

#[test]
fn test_string_over_limit_cannot_be_written() {
    let mut out = WireWriter::with_limit(4);
    out.write_u8(1);

    match out.write_str("01234") {
        Err(HearthError::MalformedPacket(msg)) => assert!(msg.contains("exceeds limit of 4")),
        other => panic!("Expected MalformedPacket, got {:?}", other),
    }
    // Nothing of the refused string was appended
    assert_eq!(out.as_slice(), &[1]);

    out.write_str("0123").unwrap();
    assert_eq!(out.len(), 1 + 2 + 4);
}

#[test]
fn test_default_writer_matches_default_reader_limit() {
    let mut out = WireWriter::new();
    out.write_str(&"x".repeat(DEFAULT_MAX_STRING_LEN)).unwrap();
    assert!(out.write_str(&"x".repeat(DEFAULT_MAX_STRING_LEN + 1)).is_err());

    let bytes = out.finish();
    let mut source: &[u8] = &bytes;
    let mut reader = WireReader::new(&mut source);
    assert_eq!(reader.read_str().unwrap().len(), DEFAULT_MAX_STRING_LEN);
}

// =============================================================================
// Frame Boundary Tests
// =============================================================================

#[test]
fn test_read_u8_or_eof_on_empty_source() {
    let mut source: &[u8] = &[];
    let mut reader = WireReader::new(&mut source);

    assert_eq!(reader.read_u8_or_eof().unwrap(), None);
    assert_eq!(reader.consumed(), 0);
}

#[test]
fn test_read_u8_or_eof_returns_byte() {
    let mut source: &[u8] = &[0x2A, 0x01];
    let mut reader = WireReader::new(&mut source);

    assert_eq!(reader.read_u8_or_eof().unwrap(), Some(0x2A));
    assert_eq!(reader.read_u8().unwrap(), 0x01);
    assert_eq!(reader.read_u8_or_eof().unwrap(), None);
}
