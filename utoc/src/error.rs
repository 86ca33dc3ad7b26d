//! Error types for `.utoc` parsing and serialization.

use thiserror::Error;

/// Result type for TOC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// TOC format error types.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Magic number was not found at the start of the file
    #[error("magic number was not found")]
    WrongMagic,

    /// Container version outside the supported range
    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u32),

    /// A fixed header field holds an unexpected value
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// A container flag this implementation does not handle
    #[error("unsupported container flag: {0}")]
    ContainerFlagUnsupported(&'static str),

    /// Input ended in the middle of a structure
    #[error("truncated input while reading {0}")]
    TruncatedInput(&'static str),

    /// Bytes remained after the last chunk meta
    #[error("{0} trailing bytes after chunk metas")]
    TrailingBytes(usize),

    /// A chunk's offset/length window exceeds the block table
    #[error("chunk {index} extends past the end of the container")]
    ChunkOutOfBounds { index: usize },

    /// Mount point did not start with `../../../`
    #[error("mount point does not start with ../../../: {0:?}")]
    BadMountPoint(String),

    /// A name index points outside the string table
    #[error("string table index {0} out of range")]
    StringIndexOutOfRange(u32),

    /// A serialized string was not valid UTF-8
    #[error("string is not valid UTF-8")]
    NonUtf8String,

    /// A chunk-id hex string did not have the 24-digit form
    #[error("invalid chunk id hex string: {0:?}")]
    InvalidChunkIdHex(String),

    /// The dependency record is internally inconsistent
    #[error("malformed dependency record: {0}")]
    MalformedDependencies(String),
}
