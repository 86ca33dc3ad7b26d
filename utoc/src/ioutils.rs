//! Packed-integer and string read/write helpers.
//!
//! The TOC format mixes byte orders: the offset/length table stores its
//! 40-bit integers big-endian, while compression-block offsets store theirs
//! little-endian, next to 24-bit little-endian sizes. The traits here keep
//! that asymmetry in one place.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Extends [`Read`] with the packed integer encodings used by the TOC.
pub trait ReadPacked: Read {
    /// Read a big-endian 40-bit unsigned integer (byte 0 most significant).
    fn read_u40_be(&mut self) -> io::Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b[3..])?;
        Ok(u64::from_be_bytes(b))
    }

    /// Read a little-endian 40-bit unsigned integer (byte 0 least significant).
    fn read_u40_le(&mut self) -> io::Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact(&mut b[..5])?;
        Ok(u64::from_le_bytes(b))
    }

    /// Read a little-endian 24-bit unsigned integer.
    fn read_u24_le(&mut self) -> io::Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b[..3])?;
        Ok(u32::from_le_bytes(b))
    }
}

impl<R: Read> ReadPacked for R {}

/// Extends [`Write`] with the packed integer encodings used by the TOC.
///
/// Values are silently truncated to the field width; callers are trusted to
/// stay in range.
pub trait WritePacked: Write {
    /// Write a big-endian 40-bit unsigned integer.
    fn write_u40_be(&mut self, value: u64) -> io::Result<()> {
        let b = value.to_be_bytes();
        self.write_all(&b[3..])
    }

    /// Write a little-endian 40-bit unsigned integer.
    fn write_u40_le(&mut self, value: u64) -> io::Result<()> {
        let b = value.to_le_bytes();
        self.write_all(&b[..5])
    }

    /// Write a little-endian 24-bit unsigned integer.
    fn write_u24_le(&mut self, value: u32) -> io::Result<()> {
        let b = value.to_le_bytes();
        self.write_all(&b[..3])
    }
}

impl<W: Write> WritePacked for W {}

/// Read a length-prefixed null-terminated string.
///
/// The `u32` length prefix counts the terminator; the terminator is trimmed
/// from the returned string.
pub fn read_string<R: Read>(reader: &mut R, what: &'static str) -> Result<String> {
    let len = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::TruncatedInput(what))? as usize;
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|_| Error::TruncatedInput(what))?;
    if buf.last() == Some(&0) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| Error::NonUtf8String)
}

/// Write a string with a `u32` length prefix and a null terminator.
pub fn write_string<W: Write>(writer: &mut W, s: &str) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(s.len() as u32 + 1)?;
    writer.write_all(s.as_bytes())?;
    writer.write_u8(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn u40_round_trips() {
        for x in [0u64, 1, 0xFF, 0x1234, 0xDEAD_BEEF, (1 << 40) - 1] {
            let mut be = Vec::new();
            be.write_u40_be(x).unwrap();
            assert_eq!(Cursor::new(&be).read_u40_be().unwrap(), x);

            let mut le = Vec::new();
            le.write_u40_le(x).unwrap();
            assert_eq!(Cursor::new(&le).read_u40_le().unwrap(), x);
        }
    }

    #[test]
    fn u40_byte_orders_differ() {
        let mut be = Vec::new();
        be.write_u40_be(1).unwrap();
        assert_eq!(be, [0, 0, 0, 0, 1]);

        let mut le = Vec::new();
        le.write_u40_le(1).unwrap();
        assert_eq!(le, [1, 0, 0, 0, 0]);
    }

    #[test]
    fn u24_round_trips() {
        for x in [0u32, 1, 0xFFFF, 0xFF_FFFF] {
            let mut buf = Vec::new();
            buf.write_u24_le(x).unwrap();
            assert_eq!(buf.len(), 3);
            assert_eq!(Cursor::new(&buf).read_u24_le().unwrap(), x);
        }
    }

    #[test]
    fn u40_truncates_silently() {
        let mut buf = Vec::new();
        buf.write_u40_be(1 << 41).unwrap();
        assert_eq!(Cursor::new(&buf).read_u40_be().unwrap(), 0);
    }

    #[test]
    fn string_round_trip_includes_terminator_in_length() {
        let mut buf = Vec::new();
        write_string(&mut buf, "Engine").unwrap();
        assert_eq!(buf.len(), 4 + 6 + 1);
        assert_eq!(&buf[..4], &7u32.to_le_bytes());
        assert_eq!(buf[buf.len() - 1], 0);

        let s = read_string(&mut Cursor::new(&buf), "test string").unwrap();
        assert_eq!(s, "Engine");
    }
}
