//! The dependency record: a pseudo-file inside `.ucas` that enumerates
//! inter-chunk references and per-chunk fields the TOC tables do not carry.
//!
//! Each link's `offset` field is self-referential: it is measured from the
//! field's own position in the record, so parsing and emitting both track
//! absolute byte positions. Parse-then-emit reproduces the input byte for
//! byte.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Constant pad bytes in the record header.
pub const DEP_PAD_MAGIC: [u8; 4] = [0x00, 0x00, 0x64, 0xC1];

const DEP_HEADER_SIZE: usize = 32;
const LINK_SIZE: usize = 32;
const ID_SIZE: u32 = 8;

/// Per-chunk fields carried by the dependency record.
///
/// `mostly_one` and `some_index` are opaque engine values; they are
/// preserved verbatim and never synthesized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    #[serde(rename = "uncompressedSize")]
    pub file_size: u64,
    #[serde(rename = "exportObjects")]
    pub export_objects: u32,
    #[serde(rename = "requiredValueSomehow")]
    pub mostly_one: u32,
    #[serde(rename = "uniqueIndex")]
    pub some_index: u64,
    #[serde(rename = "dependencies", default, deserialize_with = "null_as_empty")]
    pub dependencies: Vec<u64>,
}

/// The decoded dependency record, keyed by chunk id.
///
/// A `BTreeMap` keeps the ids in the ascending order the serialized form
/// requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyBundle {
    #[serde(rename = "packageID")]
    pub package_id: u64,
    #[serde(rename = "ChunkIDToDependencies", default)]
    pub entries: BTreeMap<u64, PackageDependency>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<u64>>::deserialize(deserializer)?.unwrap_or_default())
}

impl DependencyBundle {
    /// Parse a serialized dependency record.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let short = || Error::TruncatedInput("dependency record");
        let mut reader = Cursor::new(buf);

        let package_id = reader.read_u64::<LittleEndian>().map_err(|_| short())?;
        let num_ids = reader.read_u64::<LittleEndian>().map_err(|_| short())? as usize;
        let id_size = reader.read_u32::<LittleEndian>().map_err(|_| short())?;
        if id_size != ID_SIZE {
            return Err(Error::MalformedDependencies(format!(
                "id size {id_size}, expected {ID_SIZE}"
            )));
        }
        let mut pad = [0u8; 4];
        reader.read_exact(&mut pad).map_err(|_| short())?;
        let mut zero = [0u8; 4];
        reader.read_exact(&mut zero).map_err(|_| short())?;
        let _num_ids_again = reader.read_u32::<LittleEndian>().map_err(|_| short())?;

        // The count is untrusted; reads below fail fast on truncation.
        let mut ids = Vec::with_capacity(num_ids.min(1 << 16));
        for _ in 0..num_ids {
            ids.push(reader.read_u64::<LittleEndian>().map_err(|_| short())?);
        }

        let tail_length = reader.read_u32::<LittleEndian>().map_err(|_| short())? as usize;
        let links_len = num_ids * LINK_SIZE;
        if tail_length < links_len {
            return Err(Error::MalformedDependencies(format!(
                "tail length {tail_length} shorter than {num_ids} links"
            )));
        }

        let links_start = reader.position() as usize;
        let id_stream_start = links_start + links_len;

        struct RawLink {
            file_size: u64,
            export_objects: u32,
            mostly_one: u32,
            some_index: u64,
            dep_count: u32,
            dep_start: usize,
        }

        let mut links = Vec::with_capacity(num_ids.min(1 << 16));
        for _ in 0..num_ids {
            let file_size = reader.read_u64::<LittleEndian>().map_err(|_| short())?;
            let export_objects = reader.read_u32::<LittleEndian>().map_err(|_| short())?;
            let mostly_one = reader.read_u32::<LittleEndian>().map_err(|_| short())?;
            let some_index = reader.read_u64::<LittleEndian>().map_err(|_| short())?;
            let dep_count = reader.read_u32::<LittleEndian>().map_err(|_| short())?;
            let offset = reader.read_u32::<LittleEndian>().map_err(|_| short())?;

            // Rebase the self-referential offset to an index into the
            // dependency-id stream.
            let dep_start = if offset == 0 {
                0
            } else {
                let pos_after_link = reader.position() as usize;
                let byte_index = (pos_after_link + offset as usize)
                    .checked_sub(id_stream_start + 8)
                    .ok_or_else(|| {
                        Error::MalformedDependencies("link offset points backwards".into())
                    })?;
                byte_index / 8
            };

            links.push(RawLink {
                file_size,
                export_objects,
                mostly_one,
                some_index,
                dep_count,
                dep_start,
            });
        }

        let dep_count_total = (tail_length - links_len) / 8;
        let mut dep_stream = Vec::with_capacity(dep_count_total.min(1 << 16));
        for _ in 0..dep_count_total {
            dep_stream.push(reader.read_u64::<LittleEndian>().map_err(|_| short())?);
        }
        let _trailer = reader.read_u64::<LittleEndian>().map_err(|_| short())?;

        let mut entries = BTreeMap::new();
        for (id, link) in ids.iter().zip(&links) {
            let end = link.dep_start + link.dep_count as usize;
            if end > dep_stream.len() {
                return Err(Error::MalformedDependencies(format!(
                    "chunk {id:016x} references dependencies past the id stream"
                )));
            }
            entries.insert(
                *id,
                PackageDependency {
                    file_size: link.file_size,
                    export_objects: link.export_objects,
                    mostly_one: link.mostly_one,
                    some_index: link.some_index,
                    dependencies: dep_stream[link.dep_start..end].to_vec(),
                },
            );
        }

        Ok(Self {
            package_id,
            entries,
        })
    }

    /// Serialize the record.
    pub fn to_bytes(&self) -> Vec<u8> {
        let num_ids = self.entries.len();
        let total_deps: usize = self.entries.values().map(|e| e.dependencies.len()).sum();
        let tail_length = (num_ids * LINK_SIZE + total_deps * 8) as u32;

        let mut buf = Vec::with_capacity(
            DEP_HEADER_SIZE + num_ids * 8 + 4 + tail_length as usize + 8,
        );
        buf.write_u64::<LittleEndian>(self.package_id).expect("vec write");
        buf.write_u64::<LittleEndian>(num_ids as u64).expect("vec write");
        buf.write_u32::<LittleEndian>(ID_SIZE).expect("vec write");
        buf.extend_from_slice(&DEP_PAD_MAGIC);
        buf.extend_from_slice(&[0u8; 4]);
        buf.write_u32::<LittleEndian>(num_ids as u32).expect("vec write");

        for id in self.entries.keys() {
            buf.write_u64::<LittleEndian>(*id).expect("vec write");
        }
        buf.write_u32::<LittleEndian>(tail_length).expect("vec write");

        // Links first, then the deferred id stream they point into. Offsets
        // are measured from each link's own position, relative to the byte
        // after the tail length.
        let links_len = num_ids * LINK_SIZE;
        let mut deferred: Vec<u64> = Vec::with_capacity(total_deps);
        for (i, entry) in self.entries.values().enumerate() {
            buf.write_u64::<LittleEndian>(entry.file_size).expect("vec write");
            buf.write_u32::<LittleEndian>(entry.export_objects).expect("vec write");
            buf.write_u32::<LittleEndian>(entry.mostly_one).expect("vec write");
            buf.write_u64::<LittleEndian>(entry.some_index).expect("vec write");
            buf.write_u32::<LittleEndian>(entry.dependencies.len() as u32)
                .expect("vec write");
            let offset = if entry.dependencies.is_empty() {
                0
            } else {
                let offset_field_pos = i * LINK_SIZE + 16 + 8;
                let target = links_len + deferred.len() * 8;
                deferred.extend_from_slice(&entry.dependencies);
                (target - offset_field_pos) as u32
            };
            buf.write_u32::<LittleEndian>(offset).expect("vec write");
        }

        for dep in deferred {
            buf.write_u64::<LittleEndian>(dep).expect("vec write");
        }
        buf.write_u64::<LittleEndian>(0).expect("vec write");
        buf
    }

    /// Restrict the bundle to the given chunk ids, defaulting entries that
    /// were never recorded. Used when packing a subset of a container.
    pub fn subset(&self, ids: impl IntoIterator<Item = u64>) -> Self {
        let entries = ids
            .into_iter()
            .map(|id| (id, self.entries.get(&id).cloned().unwrap_or_default()))
            .collect();
        Self {
            package_id: self.package_id,
            entries,
        }
    }
}
