//! Name-keyed codec dispatch.
//!
//! The container format stores method names in the TOC and a method index
//! per block; both resolve here. `none` and `zlib` are built in. Oodle (or
//! any other codec) is supplied by the embedding application through
//! [`CompressionRegistry::register`], since the container format only needs
//! the two function shapes below.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{Error, Result};
use crate::zlib;

/// Compresses a buffer.
pub type CompressFn = Box<dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// Decompresses a buffer. The registry verifies the output length against
/// the block's declared uncompressed size after the call.
pub type DecompressFn = Box<dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync>;

/// A compress/decompress function pair.
pub struct Codec {
    pub compress: CompressFn,
    pub decompress: DecompressFn,
}

/// Registry of codecs keyed by case-insensitive method name.
pub struct CompressionRegistry {
    codecs: HashMap<String, Codec>,
}

impl CompressionRegistry {
    /// A registry with the built-in `none` and `zlib` codecs.
    pub fn new() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register(
            "none",
            Codec {
                compress: Box::new(|data| Ok(data.to_vec())),
                decompress: Box::new(|data| Ok(data.to_vec())),
            },
        );
        registry.register(
            "zlib",
            Codec {
                compress: Box::new(zlib::compress),
                decompress: Box::new(zlib::decompress),
            },
        );
        registry
    }

    /// Register a codec under `name`, replacing any previous entry. Use this
    /// to plug in Oodle.
    pub fn register(&mut self, name: &str, codec: Codec) {
        self.codecs.insert(name.to_ascii_lowercase(), codec);
    }

    /// Whether a codec is registered under `name`.
    pub fn supports(&self, name: &str) -> bool {
        self.codecs.contains_key(&name.to_ascii_lowercase())
    }

    fn get(&self, name: &str) -> Result<&Codec> {
        self.codecs
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownCompressionMethod(name.to_string()))
    }

    /// Compress `data` with the named method.
    pub fn compress(&self, method: &str, data: &[u8]) -> Result<Vec<u8>> {
        let out = (self.get(method)?.compress)(data)?;
        trace!(method, input = data.len(), output = out.len(), "compressed block");
        Ok(out)
    }

    /// Decompress `data` with the named method, requiring exactly
    /// `expected_len` output bytes.
    pub fn decompress(&self, method: &str, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let out = (self.get(method)?.decompress)(data)?;
        if out.len() != expected_len {
            return Err(Error::DecompressionLengthMismatch {
                expected: expected_len,
                actual: out.len(),
            });
        }
        Ok(out)
    }

    /// Decompress using a block's method index against the container's
    /// method table (index 0 = `None`).
    pub fn decompress_indexed(
        &self,
        methods: &[String],
        method_index: u8,
        data: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>> {
        let name = methods
            .get(method_index as usize)
            .ok_or(Error::UnknownCompressionMethodIndex(method_index))?;
        self.decompress(name, data, expected_len)
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let registry = CompressionRegistry::new();
        let data = b"identity".to_vec();
        assert_eq!(registry.compress("None", &data).unwrap(), data);
        assert_eq!(registry.decompress("none", &data, data.len()).unwrap(), data);
    }

    #[test]
    fn none_still_checks_expected_length() {
        let registry = CompressionRegistry::new();
        assert!(matches!(
            registry.decompress("none", b"abc", 4),
            Err(Error::DecompressionLengthMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn zlib_round_trips_through_registry() {
        let registry = CompressionRegistry::new();
        let data = vec![b'x'; 4096];
        let compressed = registry.compress("Zlib", &data).unwrap();
        let restored = registry.decompress("zlib", &compressed, data.len()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn unknown_method_is_reported() {
        let registry = CompressionRegistry::new();
        assert!(matches!(
            registry.compress("oodle", b""),
            Err(Error::UnknownCompressionMethod(_))
        ));
    }

    #[test]
    fn plugged_codec_is_dispatched() {
        let mut registry = CompressionRegistry::new();
        registry.register(
            "oodle",
            Codec {
                compress: Box::new(|data| Ok(data.iter().map(|b| b ^ 0xFF).collect())),
                decompress: Box::new(|data| Ok(data.iter().map(|b| b ^ 0xFF).collect())),
            },
        );
        let data = b"kraken".to_vec();
        let compressed = registry.compress("Oodle", &data).unwrap();
        assert_eq!(
            registry.decompress("oodle", &compressed, data.len()).unwrap(),
            data
        );
    }

    #[test]
    fn indexed_dispatch_uses_method_table() {
        let registry = CompressionRegistry::new();
        let methods = vec!["None".to_string(), "Zlib".to_string()];
        let data = b"block".to_vec();
        let out = registry
            .decompress_indexed(&methods, 0, &data, data.len())
            .unwrap();
        assert_eq!(out, data);
        assert!(matches!(
            registry.decompress_indexed(&methods, 5, &data, data.len()),
            Err(Error::UnknownCompressionMethodIndex(5))
        ));
    }
}
