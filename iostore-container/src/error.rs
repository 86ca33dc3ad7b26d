//! Error types for container reading and writing.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Container error types.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOC error: {0}")]
    Toc(#[from] utoc::Error),

    #[error("compression error: {0}")]
    Compression(#[from] iostore_compress::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] iostore_crypto::CryptoError),

    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path filter: {0}")]
    Pattern(#[from] regex::Error),

    #[error("container has no dependency record")]
    DependencyNotFound,

    #[error("manifest mismatch: {0}")]
    ManifestMismatch(String),
}

impl ContainerError {
    /// Attach a filesystem path to an IO error.
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
