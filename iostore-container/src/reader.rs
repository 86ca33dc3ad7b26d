//! Loading containers and extracting their files.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use iostore_compress::CompressionRegistry;
use iostore_crypto::CryptoError;
use utoc::{DEP_CHUNK_TYPE, DependencyBundle, DirectoryIndex, TocResource};

use crate::container::{Container, FileRecord, block_window};
use crate::error::{ContainerError, Result};
use crate::manifest::Manifest;

/// Load a `.utoc` file and resolve it into a [`Container`].
///
/// `aes_key` is required when the container's encrypted flag is set; only
/// the directory index is decrypted here, the `.ucas` stream is handled at
/// extraction time.
pub fn parse_container(utoc_path: &Path, aes_key: Option<&[u8]>) -> Result<Container> {
    let bytes = fs::read(utoc_path).map_err(ContainerError::io(utoc_path))?;
    let toc = TocResource::parse(&bytes)?;

    let mut dir_blob = toc.directory_index;
    if toc.header.is_encrypted() {
        let key = aes_key.ok_or(CryptoError::KeyMissing)?;
        iostore_crypto::decrypt_in_place(&mut dir_blob, key)?;
    }
    let directory = DirectoryIndex::parse(&dir_blob)?;
    let paths = directory.file_paths(toc.header.entry_count as usize)?;

    // The dependency pseudo-chunk is the type-10 entry matching the
    // container id. Old containers may predate the type tag; if no type-10
    // entry exists at all, fall back to the last entry, provided the
    // directory index does not claim it.
    let dependency_index = toc
        .chunk_ids
        .iter()
        .position(|id| id.kind == DEP_CHUNK_TYPE && id.id == toc.header.container_id)
        .or_else(|| {
            toc.chunk_ids
                .iter()
                .position(|id| id.kind == DEP_CHUNK_TYPE)
        })
        .or_else(|| match paths.last() {
            Some(None) => Some(paths.len() - 1),
            _ => None,
        });

    let files = toc
        .chunk_ids
        .iter()
        .zip(&toc.offlens)
        .zip(&toc.metas)
        .zip(paths)
        .enumerate()
        .map(|(i, (((chunk_id, offlen), meta), path))| {
            let (start, end) = block_window(offlen, toc.header.compression_block_size);
            let path = if dependency_index == Some(i) {
                utoc::DEP_FILE_NAME.to_string()
            } else {
                path.unwrap_or_default()
            };
            FileRecord {
                path,
                chunk_id: *chunk_id,
                offlen: *offlen,
                blocks: toc.blocks[start..end].to_vec(),
                meta: *meta,
            }
        })
        .collect();

    debug!(
        path = %utoc_path.display(),
        entries = toc.chunk_ids.len(),
        dependency_index,
        "loaded container"
    );

    Ok(Container {
        header: toc.header,
        mount_point: directory.mount_point,
        files,
        methods: toc.methods,
        dependency_index,
    })
}

/// Extract every game file whose path matches `pattern`.
///
/// Files land under `out_dir` joined with the container's mount point (minus
/// its `../../../` prefix). Returns the number of files written; on error,
/// files written so far are left in place.
pub fn extract(
    container: &Container,
    ucas_path: &Path,
    out_dir: &Path,
    pattern: &str,
    aes_key: Option<&[u8]>,
) -> Result<usize> {
    extract_with_registry(
        container,
        ucas_path,
        out_dir,
        pattern,
        aes_key,
        &CompressionRegistry::new(),
    )
}

/// [`extract`] with a caller-supplied codec registry (for Oodle).
pub fn extract_with_registry(
    container: &Container,
    ucas_path: &Path,
    out_dir: &Path,
    pattern: &str,
    aes_key: Option<&[u8]>,
    registry: &CompressionRegistry,
) -> Result<usize> {
    let pattern = Regex::new(pattern)?;
    let (mut reader, _scratch) = open_payload(container, ucas_path, aes_key)?;
    let root = out_dir.join(container.mount_relative());

    let mut written = 0;
    for record in &container.files {
        if !record.is_game_file() || !pattern.is_match(&record.path) {
            continue;
        }
        let data = read_chunk(&mut reader, ucas_path, record, &container.methods, registry)?;
        let dest = root.join(&record.path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(ContainerError::io(parent))?;
        }
        fs::write(&dest, &data).map_err(ContainerError::io(&dest))?;
        debug!(path = %record.path, bytes = data.len(), "extracted");
        written += 1;
    }

    info!(written, "extraction finished");
    Ok(written)
}

/// Decode the container's dependency record and write the manifest JSON.
pub fn build_manifest(
    container: &Container,
    ucas_path: &Path,
    out_json: &Path,
    aes_key: Option<&[u8]>,
) -> Result<()> {
    build_manifest_with_registry(
        container,
        ucas_path,
        out_json,
        aes_key,
        &CompressionRegistry::new(),
    )
}

/// [`build_manifest`] with a caller-supplied codec registry (for Oodle).
pub fn build_manifest_with_registry(
    container: &Container,
    ucas_path: &Path,
    out_json: &Path,
    aes_key: Option<&[u8]>,
    registry: &CompressionRegistry,
) -> Result<()> {
    let record = container
        .dependency_record()
        .ok_or(ContainerError::DependencyNotFound)?;

    let (mut reader, _scratch) = open_payload(container, ucas_path, aes_key)?;
    let bytes = read_chunk(&mut reader, ucas_path, record, &container.methods, registry)?;
    let dependencies = DependencyBundle::parse(&bytes)?;

    Manifest::from_container(container, dependencies).save(out_json)
}

/// Open the `.ucas` stream for reading, decrypting it into a scratch temp
/// file first when the container is encrypted. The temp file is removed when
/// the returned guard drops.
fn open_payload(
    container: &Container,
    ucas_path: &Path,
    aes_key: Option<&[u8]>,
) -> Result<(BufReader<File>, Option<NamedTempFile>)> {
    if container.header.is_encrypted() {
        let key = aes_key.ok_or(CryptoError::KeyMissing)?;
        let mut bytes = fs::read(ucas_path).map_err(ContainerError::io(ucas_path))?;
        iostore_crypto::decrypt_in_place(&mut bytes, key)?;

        let temp_err = ContainerError::io(std::env::temp_dir());
        let mut scratch = NamedTempFile::new().map_err(temp_err)?;
        scratch
            .write_all(&bytes)
            .map_err(ContainerError::io(scratch.path()))?;
        let file = scratch
            .reopen()
            .map_err(ContainerError::io(scratch.path()))?;
        debug!(scratch = %scratch.path().display(), "decrypted .ucas to scratch file");
        Ok((BufReader::new(file), Some(scratch)))
    } else {
        let file = File::open(ucas_path).map_err(ContainerError::io(ucas_path))?;
        Ok((BufReader::new(file), None))
    }
}

/// Read and decompress one chunk from its block window.
fn read_chunk<R: Read + Seek>(
    reader: &mut R,
    ucas_path: &Path,
    record: &FileRecord,
    methods: &[String],
    registry: &CompressionRegistry,
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(record.offlen.length as usize);
    for block in &record.blocks {
        reader
            .seek(SeekFrom::Start(block.offset))
            .map_err(ContainerError::io(ucas_path))?;
        let mut compressed = vec![0u8; block.compressed_size as usize];
        reader
            .read_exact(&mut compressed)
            .map_err(ContainerError::io(ucas_path))?;
        let block_data = registry.decompress_indexed(
            methods,
            block.method_index,
            &compressed,
            block.uncompressed_size as usize,
        )?;
        data.extend_from_slice(&block_data);
    }
    Ok(data)
}
