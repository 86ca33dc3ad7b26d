//! Error types for container encryption.

use thiserror::Error;

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during crypto operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The container is encrypted but no key was supplied.
    #[error("container is encrypted but no AES key was supplied")]
    KeyMissing,

    /// The supplied key has the wrong length.
    #[error("invalid AES key length: expected {expected} bytes, got {actual}")]
    KeyLength { expected: usize, actual: usize },

    /// The buffer is not a whole number of cipher blocks.
    #[error("buffer length {0} is not a multiple of the AES block size")]
    BlockMisalignment(usize),

    /// The key string could not be decoded.
    #[error("invalid AES key format: {0}")]
    InvalidKeyFormat(String),
}
