//! Error types for block compression and decompression.

use thiserror::Error;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Codec error types.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No codec is registered under the requested name
    #[error("unknown compression method: {0}")]
    UnknownCompressionMethod(String),

    /// A block's method index points outside the method table
    #[error("compression method index {0} out of range")]
    UnknownCompressionMethodIndex(u8),

    /// The codec produced a different number of bytes than the block declared
    #[error("decompressed {actual} bytes, expected {expected}")]
    DecompressionLengthMismatch { expected: usize, actual: usize },

    /// A pluggable codec reported a failure
    #[error("codec failure: {0}")]
    Codec(String),
}
