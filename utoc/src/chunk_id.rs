//! 12-byte chunk identifiers.

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

/// Identifies one addressable chunk within a container.
///
/// The `(id, index, pad, kind)` tuple is unique per container. `kind` is an
/// arbitrary chunk-type byte for game data; [`crate::DEP_CHUNK_TYPE`] marks
/// the dependency pseudo-chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId {
    pub id: u64,
    pub index: u16,
    pub pad: u8,
    pub kind: u8,
}

/// Serialized size of a chunk id.
pub const CHUNK_ID_SIZE: usize = 12;

impl ChunkId {
    /// Parse a chunk id from its 12-byte serialized form.
    pub fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            id: reader.read_u64::<LittleEndian>()?,
            index: reader.read_u16::<LittleEndian>()?,
            pad: reader.read_u8()?,
            kind: reader.read_u8()?,
        })
    }

    /// Write the 12-byte serialized form.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.id)?;
        writer.write_u16::<LittleEndian>(self.index)?;
        writer.write_u8(self.pad)?;
        writer.write_u8(self.kind)
    }

    /// Render as 24 lowercase hex digits: 16 for `id`, 4 for `index`,
    /// 2 for `pad`, 2 for `kind`.
    pub fn to_hex(&self) -> String {
        format!(
            "{:016x}{:04x}{:02x}{:02x}",
            self.id, self.index, self.pad, self.kind
        )
    }

    /// Parse the 24-hex-digit form produced by [`ChunkId::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self> {
        let bad = || Error::InvalidChunkIdHex(s.to_string());
        if s.len() != 24 || !s.is_ascii() {
            return Err(bad());
        }
        Ok(Self {
            id: u64::from_str_radix(&s[..16], 16).map_err(|_| bad())?,
            index: u16::from_str_radix(&s[16..20], 16).map_err(|_| bad())?,
            pad: u8::from_str_radix(&s[20..22], 16).map_err(|_| bad())?,
            kind: u8::from_str_radix(&s[22..24], 16).map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn binary_round_trip() {
        let id = ChunkId {
            id: 0x0123_4567_89AB_CDEF,
            index: 0x1122,
            pad: 0,
            kind: 10,
        };
        let mut buf = Vec::new();
        id.write(&mut buf).unwrap();
        assert_eq!(buf.len(), CHUNK_ID_SIZE);
        assert_eq!(ChunkId::parse(&mut Cursor::new(&buf)).unwrap(), id);
    }

    #[test]
    fn hex_round_trip() {
        let id = ChunkId {
            id: 0xDEAD_BEEF_0000_0001,
            index: 3,
            pad: 0,
            kind: 10,
        };
        let hex = id.to_hex();
        assert_eq!(hex, "deadbeef000000010003000a");
        assert_eq!(ChunkId::from_hex(&hex).unwrap(), id);
    }

    #[test]
    fn hex_rejects_wrong_length() {
        assert!(ChunkId::from_hex("abcd").is_err());
        assert!(ChunkId::from_hex(&"0".repeat(25)).is_err());
        assert!(ChunkId::from_hex(&"g".repeat(24)).is_err());
    }
}
