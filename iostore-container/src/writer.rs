//! Packing a source directory back into a `.utoc`/`.ucas` pair.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use iostore_compress::CompressionRegistry;
use utoc::{
    ChunkHash, ChunkId, ChunkMeta, COMPRESSION_BLOCK_SIZE, CompressionBlockEntry, ContainerVersion,
    DEP_CHUNK_TYPE, DEP_FILE_NAME, DirectoryIndex, META_FLAG_COMPRESSED, METHOD_NAME_LEN,
    MOUNT_PREFIX, OffsetLength, PAD_ALIGN, TocHeader, TocResource, flags,
};

use crate::container::FileRecord;
use crate::error::{ContainerError, Result};
use crate::manifest::Manifest;

/// Pack `src_dir` into `<out_stem>.utoc` / `<out_stem>.ucas`.
///
/// The manifest dictates file order, chunk ids and the dependency record;
/// `method` names the compression codec for every block. Returns the number
/// of game files packed (the dependency pseudo-file is not counted). Partial
/// outputs are deleted on error.
pub fn pack(
    src_dir: &Path,
    manifest_path: &Path,
    out_stem: &Path,
    method: &str,
    aes_key: Option<&[u8]>,
) -> Result<usize> {
    pack_with_registry(
        src_dir,
        manifest_path,
        out_stem,
        method,
        aes_key,
        &CompressionRegistry::new(),
    )
}

/// [`pack`] with a caller-supplied codec registry (for Oodle).
pub fn pack_with_registry(
    src_dir: &Path,
    manifest_path: &Path,
    out_stem: &Path,
    method: &str,
    aes_key: Option<&[u8]>,
    registry: &CompressionRegistry,
) -> Result<usize> {
    let utoc_path = out_stem.with_extension("utoc");
    let ucas_path = out_stem.with_extension("ucas");

    let result = pack_inner(
        src_dir,
        manifest_path,
        &utoc_path,
        &ucas_path,
        method,
        aes_key,
        registry,
    );
    if result.is_err() {
        let _ = fs::remove_file(&utoc_path);
        let _ = fs::remove_file(&ucas_path);
    }
    result
}

fn pack_inner(
    src_dir: &Path,
    manifest_path: &Path,
    utoc_path: &Path,
    ucas_path: &Path,
    method: &str,
    aes_key: Option<&[u8]>,
    registry: &CompressionRegistry,
) -> Result<usize> {
    let manifest = Manifest::load(manifest_path)?;
    if manifest.files.is_empty() {
        return Err(ContainerError::ManifestMismatch(
            "manifest lists no files".into(),
        ));
    }

    let chunk_ids = manifest
        .files
        .iter()
        .map(|entry| Ok(ChunkId::from_hex(&entry.chunk_id)?))
        .collect::<Result<Vec<_>>>()?;

    // Restrict the dependency record to the chunks actually packed, then
    // serialize it; it is written like any other payload.
    let dependencies = manifest
        .dependencies
        .subset(chunk_ids.iter().map(|id| id.id));
    let dep_payload = dependencies.to_bytes();

    let none_method = method.eq_ignore_ascii_case("none");
    let method_index = u8::from(!none_method);
    let mut methods = vec!["None".to_string()];
    if !none_method {
        methods.push(capitalize(method));
    }

    if let Some(parent) = ucas_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(ContainerError::io(parent))?;
    }
    let ucas_file = File::create(ucas_path).map_err(ContainerError::io(ucas_path))?;
    let mut ucas = BufWriter::new(ucas_file);
    let mut ucas_cursor: u64 = 0;
    let mut records: Vec<FileRecord> = Vec::with_capacity(manifest.files.len());
    let mut rng = rand::thread_rng();

    for (entry, chunk_id) in manifest.files.iter().zip(chunk_ids) {
        let is_dep = entry.path == DEP_FILE_NAME;
        let payload = if is_dep {
            dep_payload.clone()
        } else {
            read_source_file(src_dir, &entry.path)?
        };

        // Chunk offsets live in the uncompressed address space, each chunk
        // starting on a block boundary.
        let offset = records
            .last()
            .map(|prev| align_up(prev.offlen.end(), COMPRESSION_BLOCK_SIZE as u64))
            .unwrap_or(0);
        let offlen = OffsetLength::new(offset, payload.len() as u64);

        let mut blocks = Vec::new();
        for chunk in payload.chunks(COMPRESSION_BLOCK_SIZE as usize) {
            let compressed = registry.compress(method, chunk)?;
            blocks.push(CompressionBlockEntry {
                offset: ucas_cursor,
                compressed_size: compressed.len() as u32,
                uncompressed_size: chunk.len() as u32,
                method_index,
            });
            ucas.write_all(&compressed)
                .map_err(ContainerError::io(ucas_path))?;

            let pad_len = (PAD_ALIGN - compressed.len() % PAD_ALIGN) & (PAD_ALIGN - 1);
            let mut pad = vec![0u8; pad_len];
            rng.fill_bytes(&mut pad);
            ucas.write_all(&pad).map_err(ContainerError::io(ucas_path))?;
            ucas_cursor += (compressed.len() + pad_len) as u64;
        }

        let mut sha1 = [0u8; 20];
        sha1.copy_from_slice(&Sha1::digest(&payload));
        records.push(FileRecord {
            path: if is_dep {
                DEP_FILE_NAME.to_string()
            } else {
                entry.path.clone()
            },
            chunk_id,
            offlen,
            blocks,
            meta: ChunkMeta {
                hash: ChunkHash { sha1 },
                flags: META_FLAG_COMPRESSED,
            },
        });
        debug!(path = %entry.path, bytes = payload.len(), "packed");
    }
    ucas.flush().map_err(ContainerError::io(ucas_path))?;
    drop(ucas);

    // The directory index covers game files only; the dependency record is
    // reachable through the container id instead.
    let index_files: Vec<(String, u32)> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_game_file())
        .map(|(i, record)| (record.path.clone(), i as u32))
        .collect();
    let mut dir_blob = DirectoryIndex::build(MOUNT_PREFIX, &index_files).to_bytes();

    let mut container_flags = flags::INDEXED;
    if !none_method {
        container_flags |= flags::COMPRESSED;
    }
    if let Some(key) = aes_key {
        container_flags |= flags::ENCRYPTED;
        // The index section is encrypted in place, so it must span whole
        // cipher blocks.
        dir_blob.resize(dir_blob.len().div_ceil(16) * 16, 0);
        iostore_crypto::encrypt_in_place(&mut dir_blob, key)?;
    }

    let container_id = records
        .iter()
        .find(|record| record.chunk_id.kind == DEP_CHUNK_TYPE)
        .unwrap_or(&records[0])
        .chunk_id
        .id;

    let header = TocHeader {
        version: ContainerVersion::PartitionSize,
        entry_count: records.len() as u32,
        compressed_block_entry_count: records.iter().map(|r| r.blocks.len() as u32).sum(),
        compression_method_name_count: methods.len() as u32 - 1,
        compression_method_name_length: METHOD_NAME_LEN as u32,
        compression_block_size: COMPRESSION_BLOCK_SIZE,
        directory_index_size: dir_blob.len() as u32,
        partition_count: 1,
        partition_size: u64::MAX,
        container_id,
        encryption_key_guid: [0; 4],
        container_flags,
    };

    let toc = TocResource {
        header,
        chunk_ids: records.iter().map(|r| r.chunk_id).collect(),
        offlens: records.iter().map(|r| r.offlen).collect(),
        blocks: records.iter().flat_map(|r| r.blocks.iter().copied()).collect(),
        methods,
        directory_index: dir_blob,
        metas: records.iter().map(|r| r.meta).collect(),
    };
    fs::write(utoc_path, toc.serialize()?).map_err(ContainerError::io(utoc_path))?;

    if let Some(key) = aes_key {
        // Blocks are padded to the cipher block size, so the whole stream
        // encrypts cleanly.
        let mut bytes = fs::read(ucas_path).map_err(ContainerError::io(ucas_path))?;
        iostore_crypto::encrypt_in_place(&mut bytes, key)?;
        fs::write(ucas_path, bytes).map_err(ContainerError::io(ucas_path))?;
    }

    let game_files = records.iter().filter(|r| r.is_game_file()).count();
    info!(
        game_files,
        blocks = toc.blocks.len(),
        utoc = %utoc_path.display(),
        "container written"
    );
    Ok(game_files)
}

fn read_source_file(src_dir: &Path, path: &str) -> Result<Vec<u8>> {
    let relative: PathBuf = path.split('/').filter(|s| !s.is_empty()).collect();
    let full = src_dir.join(relative);
    match fs::read(&full) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            ContainerError::ManifestMismatch(format!("{path} is listed but missing from source")),
        ),
        Err(e) => Err(ContainerError::io(full)(e)),
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn capitalize(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_block_boundaries() {
        assert_eq!(align_up(0, 0x10000), 0);
        assert_eq!(align_up(1, 0x10000), 0x10000);
        assert_eq!(align_up(0x10000, 0x10000), 0x10000);
        assert_eq!(align_up(0x10001, 0x10000), 0x20000);
    }

    #[test]
    fn method_names_are_capitalized() {
        assert_eq!(capitalize("zlib"), "Zlib");
        assert_eq!(capitalize("OODLE"), "Oodle");
    }
}
