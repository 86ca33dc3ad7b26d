//! Compression-block table entries.

use std::io::{self, Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::ioutils::{ReadPacked, WritePacked};

/// One compressed block in the `.ucas` stream.
///
/// Unlike [`crate::OffsetLength`], the 5-byte `offset` here is
/// little-endian and is an absolute byte position in `.ucas`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionBlockEntry {
    pub offset: u64,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Index into the compression-method table; 0 means no compression.
    pub method_index: u8,
}

/// Serialized size of a block entry. The header carries this value for
/// sanity checking.
pub const BLOCK_ENTRY_SIZE: usize = 12;

impl CompressionBlockEntry {
    /// Parse from the 12-byte serialized form.
    pub fn parse<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            offset: reader.read_u40_le()?,
            compressed_size: reader.read_u24_le()?,
            uncompressed_size: reader.read_u24_le()?,
            method_index: reader.read_u8()?,
        })
    }

    /// Write the 12-byte serialized form. Oversized values are truncated to
    /// their field widths.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u40_le(self.offset)?;
        writer.write_u24_le(self.compressed_size)?;
        writer.write_u24_le(self.uncompressed_size)?;
        writer.write_u8(self.method_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trip() {
        let entry = CompressionBlockEntry {
            offset: 0x10_0000_0010,
            compressed_size: 0x1234,
            uncompressed_size: 0x10000,
            method_index: 1,
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        assert_eq!(buf.len(), BLOCK_ENTRY_SIZE);
        assert_eq!(
            CompressionBlockEntry::parse(&mut Cursor::new(&buf)).unwrap(),
            entry
        );
    }

    #[test]
    fn offset_is_little_endian() {
        let entry = CompressionBlockEntry {
            offset: 1,
            ..Default::default()
        };
        let mut buf = Vec::new();
        entry.write(&mut buf).unwrap();
        // Least significant byte first, opposite of the offset/length table.
        assert_eq!(&buf[..5], &[1, 0, 0, 0, 0]);
    }
}
