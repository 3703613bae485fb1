// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Packed integer and string encoding.
//!
//! The classic LEB128-style varint: 7 data bits per byte, high bit set on
//! every non-terminal byte, little-endian group order. Signed integers are
//! zig-zag mapped first so small negative numbers stay small. Strings are a
//! varint length prefix followed by raw bytes.
//!
//! Two decode surfaces exist because the crate reads from two worlds: `Read`
//! streams during builds (chunk files, sidecars) and byte slices when
//! decoding out of a memory map.

use std::io::{self, Read, Write};

/// A u64 varint never needs more than 10 bytes.
pub const MAX_VARINT_BYTES: usize = 10;

// ============================================================================
// STREAM ENCODING
// ============================================================================

/// Write `value` as a varint, returning the number of bytes written.
pub fn write_u64<W: Write>(out: &mut W, mut value: u64) -> io::Result<usize> {
    let mut written = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        written += 1;
        if value == 0 {
            out.write_all(&[byte])?;
            return Ok(written);
        }
        out.write_all(&[byte | 0x80])?;
    }
}

/// Zig-zag map a signed value, then varint encode it.
pub fn write_i64<W: Write>(out: &mut W, value: i64) -> io::Result<usize> {
    write_u64(out, ((value << 1) ^ (value >> 63)) as u64)
}

/// Length-prefixed byte string.
pub fn write_bytes<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<usize> {
    let prefix = write_u64(out, bytes.len() as u64)?;
    out.write_all(bytes)?;
    Ok(prefix + bytes.len())
}

pub fn write_string<W: Write>(out: &mut W, s: &str) -> io::Result<usize> {
    write_bytes(out, s.as_bytes())
}

// ============================================================================
// STREAM DECODING
// ============================================================================

pub fn read_u64<R: Read>(input: &mut R) -> io::Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;
    for _ in 0..MAX_VARINT_BYTES {
        let mut byte = [0u8; 1];
        input.read_exact(&mut byte)?;
        result |= u64::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "varint exceeds maximum length (possible corruption)",
    ))
}

/// Like [`read_u64`] but answers `None` on a clean EOF before the first
/// byte. Used by chunk-merge cursors that read records until exhaustion.
pub fn try_read_u64<R: Read>(input: &mut R) -> io::Result<Option<u64>> {
    let mut probe = [0u8; 1];
    if input.read(&mut probe)? == 0 {
        return Ok(None);
    }
    let mut result = u64::from(probe[0] & 0x7F);
    if probe[0] & 0x80 == 0 {
        return Ok(Some(result));
    }
    let mut shift = 7;
    for _ in 1..MAX_VARINT_BYTES {
        let mut byte = [0u8; 1];
        input.read_exact(&mut byte)?;
        result |= u64::from(byte[0] & 0x7F) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(result));
        }
        shift += 7;
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "varint exceeds maximum length (possible corruption)",
    ))
}

pub fn read_i64<R: Read>(input: &mut R) -> io::Result<i64> {
    let encoded = read_u64(input)?;
    Ok(((encoded >> 1) as i64) ^ -((encoded & 1) as i64))
}

pub fn read_string<R: Read>(input: &mut R) -> io::Result<String> {
    let len = read_u64(input)? as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {}", e)))
}

// ============================================================================
// SLICE DECODING (memory-mapped reads)
// ============================================================================

/// Decode a varint from the front of `bytes`, returning `(value, consumed)`.
pub fn decode_u64(bytes: &[u8]) -> io::Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in bytes.iter().enumerate().take(MAX_VARINT_BYTES) {
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    if bytes.len() >= MAX_VARINT_BYTES {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "varint exceeds maximum length (possible corruption)",
        ))
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "incomplete varint",
        ))
    }
}

/// Decode a length-prefixed string from the front of `bytes`.
pub fn decode_string(bytes: &[u8]) -> io::Result<(String, usize)> {
    let (len, mut pos) = decode_u64(bytes)?;
    let len = len as usize;
    let end = pos.checked_add(len).filter(|&end| end <= bytes.len());
    let end = end.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "truncated string payload")
    })?;
    let s = std::str::from_utf8(&bytes[pos..end])
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {}", e)))?
        .to_owned();
    pos = end;
    Ok((s, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_values_fit_in_one_byte() {
        for v in 0..128u64 {
            let mut buf = Vec::new();
            write_u64(&mut buf, v).unwrap();
            assert_eq!(buf.len(), 1);
            assert_eq!(decode_u64(&buf).unwrap(), (v, 1));
        }
    }

    #[test]
    fn max_value_takes_ten_bytes() {
        let mut buf = Vec::new();
        write_u64(&mut buf, u64::MAX).unwrap();
        assert_eq!(buf.len(), MAX_VARINT_BYTES);
        assert_eq!(decode_u64(&buf).unwrap(), (u64::MAX, MAX_VARINT_BYTES));
    }

    #[test]
    fn overlong_varint_is_rejected() {
        let bytes = [0x80u8; 11];
        assert!(decode_u64(&bytes).is_err());
    }

    #[test]
    fn truncated_varint_is_eof() {
        let bytes = [0x80u8, 0x80];
        let err = decode_u64(&bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    proptest! {
        #[test]
        fn u64_round_trips(value: u64) {
            let mut buf = Vec::new();
            let written = write_u64(&mut buf, value).unwrap();
            prop_assert_eq!(written, buf.len());
            prop_assert_eq!(decode_u64(&buf).unwrap(), (value, buf.len()));

            let mut cursor = io::Cursor::new(&buf);
            prop_assert_eq!(read_u64(&mut cursor).unwrap(), value);
        }

        #[test]
        fn i64_round_trips(value: i64) {
            let mut buf = Vec::new();
            write_i64(&mut buf, value).unwrap();
            let mut cursor = io::Cursor::new(&buf);
            prop_assert_eq!(read_i64(&mut cursor).unwrap(), value);
        }

        #[test]
        fn strings_round_trip(s in "\\PC{0,64}") {
            let mut buf = Vec::new();
            write_string(&mut buf, &s).unwrap();
            let (decoded, consumed) = decode_string(&buf).unwrap();
            prop_assert_eq!(&decoded, &s);
            prop_assert_eq!(consumed, buf.len());
        }
    }
}
