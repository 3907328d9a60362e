//! Zstore Core Library
//!
//! Core abstractions for the Zstore erasure-coded object storage engine.
//! This crate provides:
//! - Reed-Solomon erasure coding over GF(2^8) (systematic form)
//! - CRC64-ISO shard fingerprints
//! - Object manifests describing where every shard lives
//! - Common error handling and the random-access sink contract

pub mod erasure;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod sink;

pub use erasure::{decode, encode, ErasureCodec};
pub use error::{Result, ZstoreError};
pub use fingerprint::{crc64_iso, crc64_iso_hex16};
pub use manifest::{split_object_key, ObjectManifest, ShardSlot};
pub use sink::{SharedBuffer, WriteAt};

/// Default erasure coding configuration
/// - 4 data shards: minimum required to reconstruct
/// - 2 parity shards: can tolerate loss of any 2 shards
///
/// Overridable per upload via the engine / CLI flags.
pub const DEFAULT_DATA_SHARDS: usize = 4;
pub const DEFAULT_PARITY_SHARDS: usize = 2;

/// Default number of concurrent shard transfers.
pub const DEFAULT_CONCURRENCY: usize = 3;
