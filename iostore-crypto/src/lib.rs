//! Encryption support for IoStore containers.
//!
//! Encrypted containers AES-encrypt the whole `.ucas` stream and the
//! directory-index section of the `.utoc`, using a fixed 32-byte key applied
//! blockwise without chaining. See [`aes`] for the compatibility note.

pub mod aes;
pub mod error;

pub use aes::{AES_BLOCK_LEN, AES_KEY_LEN, decrypt_in_place, encrypt_in_place, parse_key_hex};
pub use error::{CryptoError, Result};
