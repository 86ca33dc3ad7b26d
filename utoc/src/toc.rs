//! Parsing and serialization of a complete `.utoc` file.
//!
//! Layout: `Header(144) | ChunkId[entry_count] | OffsetLength[entry_count] |
//! CompressionBlockEntry[block_count] | MethodName[32][method_count] |
//! DirectoryIndexBlob | ChunkMeta[entry_count]`.

use std::io::{Cursor, Read, Write};

use tracing::debug;

use crate::block::CompressionBlockEntry;
use crate::chunk_id::ChunkId;
use crate::error::{Error, Result};
use crate::header::TocHeader;
use crate::meta::ChunkMeta;
use crate::offlen::OffsetLength;

/// Everything a `.utoc` file holds, with the directory-index blob kept raw.
///
/// The blob stays undecoded here because it may be AES-encrypted; callers
/// decrypt it (when the header says so) and hand it to
/// [`crate::DirectoryIndex::parse`].
#[derive(Debug, Clone)]
pub struct TocResource {
    pub header: TocHeader,
    pub chunk_ids: Vec<ChunkId>,
    pub offlens: Vec<OffsetLength>,
    pub blocks: Vec<CompressionBlockEntry>,
    /// Compression-method names with the implicit `"None"` at index 0.
    pub methods: Vec<String>,
    pub directory_index: Vec<u8>,
    pub metas: Vec<ChunkMeta>,
}

impl TocResource {
    /// Parse a complete `.utoc` byte buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(bytes);
        let header = TocHeader::parse(&mut reader)?;

        let mut chunk_ids = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            chunk_ids.push(
                ChunkId::parse(&mut reader).map_err(|_| Error::TruncatedInput("chunk ids"))?,
            );
        }

        let mut offlens = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            offlens.push(
                OffsetLength::parse(&mut reader)
                    .map_err(|_| Error::TruncatedInput("offset/length table"))?,
            );
        }

        let mut blocks = Vec::with_capacity(header.compressed_block_entry_count as usize);
        for _ in 0..header.compressed_block_entry_count {
            blocks.push(
                CompressionBlockEntry::parse(&mut reader)
                    .map_err(|_| Error::TruncatedInput("compression block table"))?,
            );
        }

        let mut methods = vec!["None".to_string()];
        let mut name_buf = vec![0u8; header.compression_method_name_length as usize];
        for _ in 0..header.compression_method_name_count {
            reader
                .read_exact(&mut name_buf)
                .map_err(|_| Error::TruncatedInput("compression method names"))?;
            let end = name_buf.iter().position(|&b| b == 0).unwrap_or(name_buf.len());
            let name = std::str::from_utf8(&name_buf[..end])
                .map_err(|_| Error::NonUtf8String)?
                .to_string();
            methods.push(name);
        }

        let mut directory_index = vec![0u8; header.directory_index_size as usize];
        reader
            .read_exact(&mut directory_index)
            .map_err(|_| Error::TruncatedInput("directory index"))?;

        let mut metas = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            metas.push(
                ChunkMeta::parse(&mut reader).map_err(|_| Error::TruncatedInput("chunk metas"))?,
            );
        }

        let remaining = bytes.len() - reader.position() as usize;
        if remaining != 0 {
            return Err(Error::TrailingBytes(remaining));
        }

        // Every chunk must fit inside the uncompressed space the block table
        // spans.
        let container_size =
            header.compressed_block_entry_count as u64 * header.compression_block_size as u64;
        for (index, offlen) in offlens.iter().enumerate() {
            if offlen.end() > container_size {
                return Err(Error::ChunkOutOfBounds { index });
            }
        }

        debug!(
            entries = chunk_ids.len(),
            blocks = blocks.len(),
            methods = ?methods,
            "parsed .utoc"
        );

        Ok(Self {
            header,
            chunk_ids,
            offlens,
            blocks,
            methods,
            directory_index,
            metas,
        })
    }

    /// Serialize back to `.utoc` bytes.
    ///
    /// Counts come from the header, which the caller keeps consistent with
    /// the table lengths; [`TocResource::parse`] output round-trips as-is.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.header.write(&mut buf)?;
        for chunk_id in &self.chunk_ids {
            chunk_id.write(&mut buf)?;
        }
        for offlen in &self.offlens {
            offlen.write(&mut buf)?;
        }
        for block in &self.blocks {
            block.write(&mut buf)?;
        }
        // "None" at index 0 is implicit and never serialized.
        let name_len = self.header.compression_method_name_length as usize;
        for name in self.methods.iter().skip(1) {
            let mut field = vec![0u8; name_len];
            let n = name.len().min(name_len);
            field[..n].copy_from_slice(&name.as_bytes()[..n]);
            buf.write_all(&field)?;
        }
        buf.write_all(&self.directory_index)?;
        for meta in &self.metas {
            meta.write(&mut buf)?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{ContainerVersion, flags};
    use crate::meta::{ChunkHash, META_FLAG_COMPRESSED};
    use crate::{COMPRESSION_BLOCK_SIZE, DirectoryIndex, MOUNT_PREFIX};

    fn sample() -> TocResource {
        let directory_index = DirectoryIndex::build(
            MOUNT_PREFIX,
            &[("Game/hello.bin".to_string(), 0)],
        )
        .to_bytes();

        let header = TocHeader {
            version: ContainerVersion::PartitionSize,
            entry_count: 1,
            compressed_block_entry_count: 1,
            compression_method_name_count: 1,
            compression_method_name_length: 32,
            compression_block_size: COMPRESSION_BLOCK_SIZE,
            directory_index_size: directory_index.len() as u32,
            partition_count: 1,
            partition_size: u64::MAX,
            container_id: 0xABCD,
            encryption_key_guid: [0; 4],
            container_flags: flags::INDEXED | flags::COMPRESSED,
        };

        TocResource {
            header,
            chunk_ids: vec![ChunkId {
                id: 0x42,
                index: 0,
                pad: 0,
                kind: 2,
            }],
            offlens: vec![OffsetLength::new(0, 5)],
            blocks: vec![CompressionBlockEntry {
                offset: 0,
                compressed_size: 5,
                uncompressed_size: 5,
                method_index: 1,
            }],
            methods: vec!["None".to_string(), "Zlib".to_string()],
            directory_index,
            metas: vec![ChunkMeta {
                hash: ChunkHash { sha1: [7; 20] },
                flags: META_FLAG_COMPRESSED,
            }],
        }
    }

    #[test]
    fn round_trip() {
        let toc = sample();
        let bytes = toc.serialize().unwrap();
        let parsed = TocResource::parse(&bytes).unwrap();
        assert_eq!(parsed.serialize().unwrap(), bytes);
        assert_eq!(parsed.chunk_ids, toc.chunk_ids);
        assert_eq!(parsed.methods, toc.methods);
    }

    #[test]
    fn method_names_occupy_fixed_fields() {
        let bytes = sample().serialize().unwrap();
        let methods_at = 144 + 12 + 10 + 12;
        assert_eq!(&bytes[methods_at..methods_at + 4], b"Zlib");
        assert_eq!(&bytes[methods_at + 4..methods_at + 32], &[0u8; 28]);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample().serialize().unwrap();
        bytes.push(0);
        assert!(matches!(
            TocResource::parse(&bytes),
            Err(Error::TrailingBytes(1))
        ));
    }

    #[test]
    fn chunk_past_block_table_is_rejected() {
        let mut toc = sample();
        toc.offlens[0] = OffsetLength::new(0, COMPRESSION_BLOCK_SIZE as u64 + 1);
        let bytes = toc.serialize().unwrap();
        assert!(matches!(
            TocResource::parse(&bytes),
            Err(Error::ChunkOutOfBounds { index: 0 })
        ));
    }
}
