//! The fixed 144-byte TOC header.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::{HEADER_SIZE, MAGIC};
use crate::block::BLOCK_ENTRY_SIZE;

/// Container flag bits.
pub mod flags {
    /// At least one block uses a method other than None.
    pub const COMPRESSED: u8 = 1 << 0;
    /// The directory index and the `.ucas` stream are AES-encrypted.
    pub const ENCRYPTED: u8 = 1 << 1;
    /// The container carries a signature table (not supported).
    pub const SIGNED: u8 = 1 << 2;
    /// The container carries a directory index.
    pub const INDEXED: u8 = 1 << 3;
}

/// Container format versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContainerVersion {
    Initial = 1,
    DirectoryIndex = 2,
    PartitionSize = 3,
}

impl ContainerVersion {
    fn from_u32(raw: u32) -> Result<Self> {
        match raw {
            // Initial containers have no directory index to recover paths
            // from, so they are rejected along with unknown versions.
            2 => Ok(Self::DirectoryIndex),
            3 => Ok(Self::PartitionSize),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }
}

/// The parsed 144-byte `.utoc` header.
///
/// `partition_size` is runtime state: the serialized layout has no field for
/// it, and every supported container is single-partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocHeader {
    pub version: ContainerVersion,
    pub entry_count: u32,
    pub compressed_block_entry_count: u32,
    pub compression_method_name_count: u32,
    pub compression_method_name_length: u32,
    pub compression_block_size: u32,
    pub directory_index_size: u32,
    pub partition_count: u32,
    pub partition_size: u64,
    pub container_id: u64,
    pub encryption_key_guid: [u32; 4],
    pub container_flags: u8,
}

impl TocHeader {
    /// Parse and validate the 144-byte header.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 16];
        reader
            .read_exact(&mut magic)
            .map_err(|_| Error::TruncatedInput("header"))?;
        if magic != MAGIC {
            return Err(Error::WrongMagic);
        }

        let version = ContainerVersion::from_u32(reader.read_u32::<LittleEndian>()?)?;
        let header_size = reader.read_u32::<LittleEndian>()?;
        if header_size != HEADER_SIZE as u32 {
            return Err(Error::MalformedHeader(format!(
                "header size {header_size}, expected {HEADER_SIZE}"
            )));
        }
        let entry_count = reader.read_u32::<LittleEndian>()?;
        let compressed_block_entry_count = reader.read_u32::<LittleEndian>()?;
        let block_entry_size = reader.read_u32::<LittleEndian>()?;
        if block_entry_size != BLOCK_ENTRY_SIZE as u32 {
            return Err(Error::MalformedHeader(format!(
                "compressed block entry size {block_entry_size}, expected {BLOCK_ENTRY_SIZE}"
            )));
        }
        let compression_method_name_count = reader.read_u32::<LittleEndian>()?;
        let compression_method_name_length = reader.read_u32::<LittleEndian>()?;
        let compression_block_size = reader.read_u32::<LittleEndian>()?;
        let directory_index_size = reader.read_u32::<LittleEndian>()?;
        let mut partition_count = reader.read_u32::<LittleEndian>()?;
        let container_id = reader.read_u64::<LittleEndian>()?;
        let mut encryption_key_guid = [0u32; 4];
        for part in &mut encryption_key_guid {
            *part = reader.read_u32::<LittleEndian>()?;
        }
        let container_flags = reader.read_u8()?;
        let mut padding = [0u8; 63];
        reader
            .read_exact(&mut padding)
            .map_err(|_| Error::TruncatedInput("header"))?;

        if container_flags & flags::SIGNED != 0 {
            return Err(Error::ContainerFlagUnsupported("Signed"));
        }
        if container_flags != 0 && container_flags & flags::INDEXED == 0 {
            // Without a directory index there is no way to recover paths.
            return Err(Error::ContainerFlagUnsupported("not Indexed"));
        }

        if version == ContainerVersion::DirectoryIndex {
            partition_count = 1;
        }

        debug!(
            ?version,
            entry_count, compressed_block_entry_count, directory_index_size, "parsed TOC header"
        );

        Ok(Self {
            version,
            entry_count,
            compressed_block_entry_count,
            compression_method_name_count,
            compression_method_name_length,
            compression_block_size,
            directory_index_size,
            partition_count,
            partition_size: u64::MAX,
            container_id,
            encryption_key_guid,
            container_flags,
        })
    }

    /// Write the 144-byte serialized form.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version as u32)?;
        writer.write_u32::<LittleEndian>(HEADER_SIZE as u32)?;
        writer.write_u32::<LittleEndian>(self.entry_count)?;
        writer.write_u32::<LittleEndian>(self.compressed_block_entry_count)?;
        writer.write_u32::<LittleEndian>(BLOCK_ENTRY_SIZE as u32)?;
        writer.write_u32::<LittleEndian>(self.compression_method_name_count)?;
        writer.write_u32::<LittleEndian>(self.compression_method_name_length)?;
        writer.write_u32::<LittleEndian>(self.compression_block_size)?;
        writer.write_u32::<LittleEndian>(self.directory_index_size)?;
        writer.write_u32::<LittleEndian>(self.partition_count)?;
        writer.write_u64::<LittleEndian>(self.container_id)?;
        for part in &self.encryption_key_guid {
            writer.write_u32::<LittleEndian>(*part)?;
        }
        writer.write_u8(self.container_flags)?;
        writer.write_all(&[0u8; 63])?;
        Ok(())
    }

    pub fn is_compressed(&self) -> bool {
        self.container_flags & flags::COMPRESSED != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.container_flags & flags::ENCRYPTED != 0
    }

    pub fn is_indexed(&self) -> bool {
        self.container_flags & flags::INDEXED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COMPRESSION_BLOCK_SIZE;
    use std::io::Cursor;

    fn sample() -> TocHeader {
        TocHeader {
            version: ContainerVersion::PartitionSize,
            entry_count: 2,
            compressed_block_entry_count: 2,
            compression_method_name_count: 1,
            compression_method_name_length: 32,
            compression_block_size: COMPRESSION_BLOCK_SIZE,
            directory_index_size: 77,
            partition_count: 1,
            partition_size: u64::MAX,
            container_id: 0xFEED_F00D,
            encryption_key_guid: [0; 4],
            container_flags: flags::INDEXED | flags::COMPRESSED,
        }
    }

    #[test]
    fn round_trip_is_144_bytes() {
        let header = sample();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(TocHeader::parse(&mut Cursor::new(&buf)).unwrap(), header);
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        buf[3] ^= 0xFF;
        assert!(matches!(
            TocHeader::parse(&mut Cursor::new(&buf)),
            Err(Error::WrongMagic)
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        buf[16] = 7;
        assert!(matches!(
            TocHeader::parse(&mut Cursor::new(&buf)),
            Err(Error::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn bad_block_entry_size_is_rejected() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        buf[32] = 13;
        assert!(matches!(
            TocHeader::parse(&mut Cursor::new(&buf)),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn signed_flag_is_rejected() {
        let mut header = sample();
        header.container_flags |= flags::SIGNED;
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert!(matches!(
            TocHeader::parse(&mut Cursor::new(&buf)),
            Err(Error::ContainerFlagUnsupported("Signed"))
        ));
    }

    #[test]
    fn version_two_defaults_partitioning() {
        let mut header = sample();
        header.version = ContainerVersion::DirectoryIndex;
        header.partition_count = 0;
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let parsed = TocHeader::parse(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed.partition_count, 1);
        assert_eq!(parsed.partition_size, u64::MAX);
    }
}
