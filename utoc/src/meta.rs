//! Per-chunk metadata entries.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

/// SHA-1 of a chunk's uncompressed payload, stored in a 32-byte field with
/// 12 zero bytes of padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkHash {
    pub sha1: [u8; 20],
}

impl ChunkHash {
    pub fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut sha1 = [0u8; 20];
        reader.read_exact(&mut sha1)?;
        let mut pad = [0u8; 12];
        reader.read_exact(&mut pad)?;
        Ok(Self { sha1 })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.sha1)?;
        writer.write_all(&[0u8; 12])
    }
}

/// Meta flag marking a chunk as compressed and present.
pub const META_FLAG_COMPRESSED: u8 = 1;

/// Hash plus flags for one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkMeta {
    pub hash: ChunkHash,
    pub flags: u8,
}

/// Serialized size of a chunk meta entry.
pub const CHUNK_META_SIZE: usize = 33;

impl ChunkMeta {
    pub fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            hash: ChunkHash::parse(reader)?,
            flags: reader.read_u8()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.hash.write(writer)?;
        writer.write_u8(self.flags)
    }
}
