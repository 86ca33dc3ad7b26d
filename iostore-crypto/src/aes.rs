//! Raw blockwise AES-256 over whole buffers.
//!
//! The host engine applies the block cipher to each 16-byte block of a
//! buffer directly, with no chaining and no IV. That is what containers in
//! the wild contain, so the same scheme is replicated here; switching to a
//! chained mode would break compatibility.

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::{CryptoError, Result};

/// Required key length in bytes.
pub const AES_KEY_LEN: usize = 32;

/// Cipher block length in bytes.
pub const AES_BLOCK_LEN: usize = 16;

fn cipher_for(key: &[u8]) -> Result<Aes256> {
    Aes256::new_from_slice(key).map_err(|_| CryptoError::KeyLength {
        expected: AES_KEY_LEN,
        actual: key.len(),
    })
}

fn check_alignment(len: usize) -> Result<()> {
    if len % AES_BLOCK_LEN != 0 {
        return Err(CryptoError::BlockMisalignment(len));
    }
    Ok(())
}

/// Encrypt a buffer in place, one cipher block at a time.
pub fn encrypt_in_place(data: &mut [u8], key: &[u8]) -> Result<()> {
    let cipher = cipher_for(key)?;
    check_alignment(data.len())?;
    for block in data.chunks_mut(AES_BLOCK_LEN) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Decrypt a buffer in place, one cipher block at a time.
pub fn decrypt_in_place(data: &mut [u8], key: &[u8]) -> Result<()> {
    let cipher = cipher_for(key)?;
    check_alignment(data.len())?;
    for block in data.chunks_mut(AES_BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(())
}

/// Parse a hex key string, accepting an optional `0x`/`0X` prefix.
pub fn parse_key_hex(s: &str) -> Result<Vec<u8>> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let key = hex::decode(trimmed).map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
    if key.len() != AES_KEY_LEN {
        return Err(CryptoError::KeyLength {
            expected: AES_KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [0x42u8; AES_KEY_LEN];
        let original = vec![7u8; 64];
        let mut data = original.clone();

        encrypt_in_place(&mut data, &key).unwrap();
        assert_ne!(data, original);
        decrypt_in_place(&mut data, &key).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn matches_known_ecb_vector() {
        // NIST AES-256 known-answer vector; each block is transformed
        // independently, so the chaining-free scheme must reproduce it.
        let key = parse_key_hex(
            "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4",
        )
        .unwrap();
        let mut data = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        encrypt_in_place(&mut data, &key).unwrap();
        assert_eq!(hex::encode(&data), "f3eed1bdb5d2a03c064b5a7e3db181f8");
    }

    #[test]
    fn identical_blocks_encrypt_identically() {
        // No chaining: two equal plaintext blocks give two equal
        // ciphertext blocks.
        let key = [9u8; AES_KEY_LEN];
        let mut data = vec![0xA5u8; 32];
        encrypt_in_place(&mut data, &key).unwrap();
        let (first, second) = data.split_at(16);
        assert_eq!(first, second);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let mut data = vec![0u8; 16];
        assert!(matches!(
            encrypt_in_place(&mut data, &[0u8; 16]),
            Err(CryptoError::KeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let mut data = vec![0u8; 15];
        assert!(matches!(
            decrypt_in_place(&mut data, &[0u8; 32]),
            Err(CryptoError::BlockMisalignment(15))
        ));
    }

    #[test]
    fn key_hex_prefix_is_optional() {
        let bare = "11".repeat(32);
        let prefixed = format!("0x{bare}");
        assert_eq!(parse_key_hex(&bare).unwrap(), parse_key_hex(&prefixed).unwrap());
        assert!(matches!(
            parse_key_hex("0xabcd"),
            Err(CryptoError::KeyLength { .. })
        ));
        assert!(matches!(
            parse_key_hex("zz"),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
    }
}
