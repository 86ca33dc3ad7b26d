//! The directory-index blob: a linked tree of directories and files flattened
//! into three arrays plus a shared string table.
//!
//! Entry 0 of the directory array is the root and carries no name. Links are
//! indices into the arrays with [`NONE_ENTRY`] as the absent sentinel; the
//! `user_data` of a file entry is its chunk's index into the TOC tables.

use std::collections::HashMap;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::trace;

use crate::error::{Error, Result};
use crate::ioutils::{read_string, write_string};
use crate::{MOUNT_PREFIX, NONE_ENTRY};

/// One directory node in the flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: u32,
    pub first_child: u32,
    pub next_sibling: u32,
    pub first_file: u32,
}

impl DirectoryEntry {
    fn blank() -> Self {
        Self {
            name: NONE_ENTRY,
            first_child: NONE_ENTRY,
            next_sibling: NONE_ENTRY,
            first_file: NONE_ENTRY,
        }
    }
}

/// One file node in the flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    pub name: u32,
    pub next_file: u32,
    pub user_data: u32,
}

/// The decoded directory-index blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIndex {
    /// Full mount point, always starting with `../../../`.
    pub mount_point: String,
    pub directories: Vec<DirectoryEntry>,
    pub files: Vec<FileEntry>,
    pub strings: Vec<String>,
}

impl DirectoryIndex {
    /// Parse the blob. Trailing bytes beyond the string table are ignored;
    /// encrypted indices are padded to the cipher block size.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(buf);

        let mount_point = read_string(&mut reader, "mount point")?;
        if !mount_point.starts_with(MOUNT_PREFIX) {
            return Err(Error::BadMountPoint(mount_point));
        }

        let dir_count = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::TruncatedInput("directory entries"))?;
        let mut directories = Vec::with_capacity(dir_count as usize);
        for _ in 0..dir_count {
            directories.push(DirectoryEntry {
                name: read_link(&mut reader, "directory entries")?,
                first_child: read_link(&mut reader, "directory entries")?,
                next_sibling: read_link(&mut reader, "directory entries")?,
                first_file: read_link(&mut reader, "directory entries")?,
            });
        }

        let file_count = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::TruncatedInput("file entries"))?;
        let mut files = Vec::with_capacity(file_count as usize);
        for _ in 0..file_count {
            files.push(FileEntry {
                name: read_link(&mut reader, "file entries")?,
                next_file: read_link(&mut reader, "file entries")?,
                user_data: read_link(&mut reader, "file entries")?,
            });
        }

        let string_count = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::TruncatedInput("string table"))?;
        let mut strings = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            strings.push(read_string(&mut reader, "string table")?);
        }

        trace!(
            dirs = directories.len(),
            files = files.len(),
            strings = strings.len(),
            "parsed directory index"
        );

        Ok(Self {
            mount_point,
            directories,
            files,
            strings,
        })
    }

    /// Serialize the blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_string(&mut buf, &self.mount_point).expect("vec write");
        buf.write_u32::<LittleEndian>(self.directories.len() as u32)
            .expect("vec write");
        for dir in &self.directories {
            buf.write_u32::<LittleEndian>(dir.name).expect("vec write");
            buf.write_u32::<LittleEndian>(dir.first_child)
                .expect("vec write");
            buf.write_u32::<LittleEndian>(dir.next_sibling)
                .expect("vec write");
            buf.write_u32::<LittleEndian>(dir.first_file)
                .expect("vec write");
        }
        buf.write_u32::<LittleEndian>(self.files.len() as u32)
            .expect("vec write");
        for file in &self.files {
            buf.write_u32::<LittleEndian>(file.name).expect("vec write");
            buf.write_u32::<LittleEndian>(file.next_file)
                .expect("vec write");
            buf.write_u32::<LittleEndian>(file.user_data)
                .expect("vec write");
        }
        buf.write_u32::<LittleEndian>(self.strings.len() as u32)
            .expect("vec write");
        for s in &self.strings {
            write_string(&mut buf, s).expect("vec write");
        }
        buf
    }

    /// Mount point with the `../../../` prefix stripped.
    pub fn mount_relative(&self) -> &str {
        self.mount_point
            .strip_prefix(MOUNT_PREFIX)
            .unwrap_or(&self.mount_point)
    }

    /// Resolve every file path, ordered by `user_data`.
    ///
    /// The result has `entry_count` slots; `result[user_data]` is the slash
    /// separated path of that chunk's file. Slots no file points at stay
    /// `None` (the dependency pseudo-chunk has no directory entry).
    pub fn file_paths(&self, entry_count: usize) -> Result<Vec<Option<String>>> {
        let mut paths = vec![None; entry_count];
        if self.directories.is_empty() {
            return Ok(paths);
        }

        let mut seen_dirs = vec![false; self.directories.len()];
        let mut seen_files = vec![false; self.files.len()];
        let mut stack = vec![(0u32, String::new())];

        while let Some((dir_idx, prefix)) = stack.pop() {
            let dir = *self.directory(dir_idx)?;
            if std::mem::replace(&mut seen_dirs[dir_idx as usize], true) {
                return Err(Error::MalformedHeader(
                    "directory index contains a cycle".into(),
                ));
            }

            let path = if dir.name == NONE_ENTRY {
                prefix.clone()
            } else {
                format!("{prefix}{}/", self.string(dir.name)?)
            };

            let mut file_idx = dir.first_file;
            while file_idx != NONE_ENTRY {
                let file = *self.file(file_idx)?;
                if std::mem::replace(&mut seen_files[file_idx as usize], true) {
                    return Err(Error::MalformedHeader(
                        "file list contains a cycle".into(),
                    ));
                }
                if file.user_data != NONE_ENTRY {
                    let slot = file.user_data as usize;
                    if slot >= entry_count {
                        return Err(Error::ChunkOutOfBounds { index: slot });
                    }
                    paths[slot] = Some(format!("{path}{}", self.string(file.name)?));
                }
                file_idx = file.next_file;
            }

            if dir.next_sibling != NONE_ENTRY {
                stack.push((dir.next_sibling, prefix));
            }
            if dir.first_child != NONE_ENTRY {
                stack.push((dir.first_child, path));
            }
        }

        Ok(paths)
    }

    /// Build an index from `(path, user_data)` pairs.
    ///
    /// Paths are slash separated; empty segments are skipped, so a leading
    /// slash is accepted. Sibling order follows first appearance in `files`,
    /// and the flattening is breadth-first from the root.
    pub fn build(mount_point: &str, files: &[(String, u32)]) -> Self {
        let mut tree = Tree::new();
        for (path, user_data) in files {
            tree.insert(path, *user_data);
        }
        tree.flatten(mount_point)
    }

    fn directory(&self, idx: u32) -> Result<&DirectoryEntry> {
        self.directories
            .get(idx as usize)
            .ok_or(Error::StringIndexOutOfRange(idx))
    }

    fn file(&self, idx: u32) -> Result<&FileEntry> {
        self.files
            .get(idx as usize)
            .ok_or(Error::StringIndexOutOfRange(idx))
    }

    fn string(&self, idx: u32) -> Result<&str> {
        self.strings
            .get(idx as usize)
            .map(String::as_str)
            .ok_or(Error::StringIndexOutOfRange(idx))
    }
}

fn read_link(reader: &mut Cursor<&[u8]>, what: &'static str) -> Result<u32> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::TruncatedInput(what))
}

/// Arena-backed directory tree used while building an index.
struct TreeNode {
    name: Option<String>,
    dirs: Vec<usize>,
    files: Vec<(String, u32)>,
}

struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                name: None,
                dirs: Vec::new(),
                files: Vec::new(),
            }],
        }
    }

    fn insert(&mut self, path: &str, user_data: u32) {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            return;
        };

        let mut node = 0usize;
        for segment in segments {
            let existing = self.nodes[node]
                .dirs
                .iter()
                .copied()
                .find(|&child| self.nodes[child].name.as_deref() == Some(segment));
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TreeNode {
                        name: Some(segment.to_string()),
                        dirs: Vec::new(),
                        files: Vec::new(),
                    });
                    self.nodes[node].dirs.push(child);
                    child
                }
            };
        }
        self.nodes[node].files.push((file_name.to_string(), user_data));
    }

    fn flatten(&self, mount_point: &str) -> DirectoryIndex {
        // First pass: assign flat indices in breadth-first order.
        let mut order = vec![0usize];
        let mut flat_index = HashMap::new();
        flat_index.insert(0usize, 0u32);
        let mut head = 0;
        while head < order.len() {
            let node = order[head];
            head += 1;
            for &child in &self.nodes[node].dirs {
                flat_index.insert(child, order.len() as u32);
                order.push(child);
            }
        }

        // Second pass: emit entries, interning strings as they first appear.
        let mut index = DirectoryIndex {
            mount_point: mount_point.to_string(),
            directories: Vec::with_capacity(order.len()),
            files: Vec::new(),
            strings: Vec::new(),
        };
        let mut interned: HashMap<String, u32> = HashMap::new();
        let mut intern = |strings: &mut Vec<String>, name: &str| -> u32 {
            *interned.entry(name.to_string()).or_insert_with(|| {
                strings.push(name.to_string());
                strings.len() as u32 - 1
            })
        };

        for (flat, &node_id) in order.iter().enumerate() {
            let node = &self.nodes[node_id];
            let mut entry = DirectoryEntry::blank();

            if let Some(name) = &node.name {
                entry.name = intern(&mut index.strings, name);
            }
            if let Some(&first) = node.dirs.first() {
                entry.first_child = flat_index[&first];
            }
            // Siblings are consecutive in BFS order, so the link is the next
            // flat index for every child but the last in its parent's list.
            let parent_last_child = self
                .parent_of(node_id)
                .and_then(|p| self.nodes[p].dirs.last().copied());
            if parent_last_child.is_some_and(|last| last != node_id) {
                entry.next_sibling = flat as u32 + 1;
            }

            if !node.files.is_empty() {
                entry.first_file = index.files.len() as u32;
                let count = node.files.len();
                for (i, (name, user_data)) in node.files.iter().enumerate() {
                    let next_file = if i + 1 < count {
                        index.files.len() as u32 + 1
                    } else {
                        NONE_ENTRY
                    };
                    index.files.push(FileEntry {
                        name: intern(&mut index.strings, name),
                        next_file,
                        user_data: *user_data,
                    });
                }
            }

            index.directories.push(entry);
        }

        index
    }

    fn parent_of(&self, node_id: usize) -> Option<usize> {
        if node_id == 0 {
            return None;
        }
        self.nodes
            .iter()
            .position(|node| node.dirs.contains(&node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_files() -> Vec<(String, u32)> {
        vec![
            ("a/b/c/x.bin".to_string(), 0),
            ("a/b/y.bin".to_string(), 1),
            ("a/z.bin".to_string(), 2),
            ("top.bin".to_string(), 3),
        ]
    }

    #[test]
    fn build_then_resolve_paths() {
        let index = DirectoryIndex::build(MOUNT_PREFIX, &sample_files());
        let paths = index.file_paths(4).unwrap();
        assert_eq!(paths[0].as_deref(), Some("a/b/c/x.bin"));
        assert_eq!(paths[1].as_deref(), Some("a/b/y.bin"));
        assert_eq!(paths[2].as_deref(), Some("a/z.bin"));
        assert_eq!(paths[3].as_deref(), Some("top.bin"));
    }

    #[test]
    fn root_entry_has_no_name() {
        let index = DirectoryIndex::build(MOUNT_PREFIX, &sample_files());
        assert_eq!(index.directories[0].name, NONE_ENTRY);
    }

    #[test]
    fn blob_round_trips_byte_identically() {
        let index = DirectoryIndex::build(MOUNT_PREFIX, &sample_files());
        let blob = index.to_bytes();
        let reparsed = DirectoryIndex::parse(&blob).unwrap();
        assert_eq!(reparsed.to_bytes(), blob);
        assert_eq!(reparsed, index);
    }

    #[test]
    fn leading_slash_paths_are_accepted() {
        let files = vec![("/Game/Maps/level.bin".to_string(), 0)];
        let index = DirectoryIndex::build(MOUNT_PREFIX, &files);
        let paths = index.file_paths(1).unwrap();
        assert_eq!(paths[0].as_deref(), Some("Game/Maps/level.bin"));
    }

    #[test]
    fn missing_user_data_slot_stays_empty() {
        let files = vec![("a.bin".to_string(), 0)];
        let index = DirectoryIndex::build(MOUNT_PREFIX, &files);
        let paths = index.file_paths(2).unwrap();
        assert_eq!(paths[1], None);
    }

    #[test]
    fn bad_mount_point_is_rejected() {
        let index = DirectoryIndex::build("not-a-mount/", &[]);
        let blob = index.to_bytes();
        assert!(matches!(
            DirectoryIndex::parse(&blob),
            Err(Error::BadMountPoint(_))
        ));
    }

    #[test]
    fn trailing_padding_is_tolerated() {
        let index = DirectoryIndex::build(MOUNT_PREFIX, &sample_files());
        let mut blob = index.to_bytes();
        let unpadded = blob.clone();
        blob.resize(blob.len().div_ceil(16) * 16, 0);
        let reparsed = DirectoryIndex::parse(&blob).unwrap();
        assert_eq!(reparsed.to_bytes(), unpadded);
    }

    #[test]
    fn user_data_out_of_bounds_is_rejected() {
        let files = vec![("a.bin".to_string(), 9)];
        let index = DirectoryIndex::build(MOUNT_PREFIX, &files);
        assert!(matches!(
            index.file_paths(1),
            Err(Error::ChunkOutOfBounds { index: 9 })
        ));
    }
}
