//! Block compression for IoStore containers.
//!
//! Container payloads are compressed in 64 KiB blocks, each tagged with an
//! index into the container's method-name table. This crate dispatches those
//! methods: `none` and `zlib` are built in, and anything else (notably
//! Oodle Kraken) is plugged into the registry by the embedding application.
//!
//! Decompression enforces the format's length contract: a block's output
//! must match its declared uncompressed size exactly.

pub mod error;
pub mod registry;
pub mod zlib;

pub use error::{Error, Result};
pub use registry::{Codec, CompressFn, CompressionRegistry, DecompressFn};
