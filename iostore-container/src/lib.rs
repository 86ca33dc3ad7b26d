//! Reader and writer for paired `.utoc`/`.ucas` IoStore containers.
//!
//! Reading resolves the TOC into a [`Container`] and streams decompressed
//! file bytes to disk; writing takes a source directory plus the manifest
//! recovered from a prior extraction and emits a fresh pair the host engine
//! loader accepts. All operations are synchronous and single-threaded, and
//! hold one handle per container file at a time.

pub mod container;
pub mod error;
pub mod manifest;
pub mod reader;
pub mod writer;

pub use container::{Container, FileRecord};
pub use error::{ContainerError, Result};
pub use manifest::{Manifest, ManifestFile};
pub use reader::{
    build_manifest, build_manifest_with_registry, extract, extract_with_registry, parse_container,
};
pub use writer::{pack, pack_with_registry};
