//! Runtime view of a parsed container.

use utoc::{
    ChunkId, ChunkMeta, CompressionBlockEntry, DEP_FILE_NAME, MOUNT_PREFIX, OffsetLength,
    TocHeader,
};

/// One chunk of the container together with everything needed to read or
/// rewrite it.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Slash-separated path under the mount point. The dependency
    /// pseudo-chunk uses [`DEP_FILE_NAME`]; chunks absent from the directory
    /// index have an empty path.
    pub path: String,
    pub chunk_id: ChunkId,
    pub offlen: OffsetLength,
    /// The chunk's window into the compression-block table.
    pub blocks: Vec<CompressionBlockEntry>,
    pub meta: ChunkMeta,
}

impl FileRecord {
    /// Whether this record is a regular game file (present in the directory
    /// index and not the dependency record).
    pub fn is_game_file(&self) -> bool {
        !self.path.is_empty() && self.path != DEP_FILE_NAME
    }
}

/// A parsed `.utoc` with its chunks resolved to paths and block windows.
#[derive(Debug, Clone)]
pub struct Container {
    pub header: TocHeader,
    /// Full mount point, always starting with `../../../`.
    pub mount_point: String,
    /// Records in TOC entry order; `files[user_data]` is the file that
    /// directory-index slot points at.
    pub files: Vec<FileRecord>,
    /// Compression-method names, index 0 = `"None"`.
    pub methods: Vec<String>,
    /// Index of the dependency pseudo-chunk in `files`, when present.
    pub dependency_index: Option<usize>,
}

impl Container {
    /// Paths of the packed game files, in TOC order.
    pub fn list_files(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|record| record.is_game_file())
            .map(|record| record.path.as_str())
            .collect()
    }

    /// The dependency pseudo-chunk's record.
    pub fn dependency_record(&self) -> Option<&FileRecord> {
        self.dependency_index.map(|i| &self.files[i])
    }

    /// Mount point with the `../../../` prefix stripped.
    pub fn mount_relative(&self) -> &str {
        self.mount_point
            .strip_prefix(MOUNT_PREFIX)
            .unwrap_or(&self.mount_point)
    }
}

/// The half-open block-table window `[start, end)` covering a chunk.
pub(crate) fn block_window(offlen: &OffsetLength, block_size: u32) -> (usize, usize) {
    let block_size = block_size as u64;
    let start = (offlen.offset / block_size) as usize;
    let end = offlen.end().div_ceil(block_size) as usize;
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_covers_offset_and_length() {
        let block_size = 0x10000u32;
        for (offset, length) in [(0u64, 5u64), (0x10000, 0x10000), (0x20000, 0x18001)] {
            let offlen = OffsetLength::new(offset, length);
            let (start, end) = block_window(&offlen, block_size);
            assert!(start as u64 * block_size as u64 <= offset);
            assert!(offset < (start as u64 + 1) * block_size as u64);
            assert!(end as u64 * block_size as u64 >= offset + length);
        }
    }

    #[test]
    fn empty_chunk_has_empty_window() {
        let offlen = OffsetLength::new(0x10000, 0);
        let (start, end) = block_window(&offlen, 0x10000);
        assert_eq!(start, end);
    }
}
