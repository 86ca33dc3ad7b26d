//! Per-chunk offset/length pairs.

use std::io::{self, Read, Write};

use crate::ioutils::{ReadPacked, WritePacked};

/// Uncompressed offset and length of a chunk, serialized as two 5-byte
/// big-endian integers.
///
/// The offset is a position in the container's uncompressed address space
/// (block index times block size), not a byte position in `.ucas`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetLength {
    pub offset: u64,
    pub length: u64,
}

/// Serialized size of an offset/length pair.
pub const OFFSET_LENGTH_SIZE: usize = 10;

impl OffsetLength {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Parse from the 10-byte serialized form.
    pub fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            offset: reader.read_u40_be()?,
            length: reader.read_u40_be()?,
        })
    }

    /// Write the 10-byte serialized form. Values are truncated to 40 bits.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u40_be(self.offset)?;
        writer.write_u40_be(self.length)
    }

    /// One past the last uncompressed byte this chunk covers.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}
