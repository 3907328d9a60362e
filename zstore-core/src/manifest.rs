//! Object manifests
//!
//! A manifest is the recipe to reconstruct one logical object: the original
//! payload size, the uniform shard size, the parity count, and one slot per
//! shard recording where it was placed and how to verify it.

use serde::{Deserialize, Serialize};

/// Where one shard lives and how to verify it.
///
/// A freshly encoded slot carries only the hash; the upload orchestrator
/// fills in the remaining fields once the shard has landed. An empty
/// `backend_kind` therefore marks an unresolved slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSlot {
    /// CRC64-ISO of the shard bytes, lowercase 16-hex.
    pub hash: String,
    /// Backend family tag ("s3", "gcs", ...).
    pub backend_kind: String,
    /// Logical bucket the shard was placed in.
    pub bucket_name: String,
    /// Key of the shard object inside the bucket.
    pub storage_key: String,
}

impl ShardSlot {
    /// Create a slot that has been fingerprinted but not yet placed.
    pub fn unplaced(hash: String) -> Self {
        Self {
            hash,
            backend_kind: String::new(),
            bucket_name: String::new(),
            storage_key: String::new(),
        }
    }

    /// Whether the upload orchestrator has stamped this slot with a
    /// storage location.
    pub fn is_resolved(&self) -> bool {
        !self.backend_kind.is_empty() && !self.storage_key.is_empty()
    }
}

/// Manifest of one erasure-coded logical object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectManifest {
    /// Directory portion of the object key (partition key).
    pub prefix: String,
    /// Terminal component of the object key (sort key).
    pub file_name: String,
    /// Exact payload length; decode trims the reconstruction to this.
    pub original_size: i64,
    /// Uniform length of every shard.
    pub shard_size: i64,
    /// Number of parity shards (m). Data shard count is derived.
    pub parity_shards: usize,
    /// One slot per shard, index-ordered. The sole authority for
    /// reconstruction.
    pub shard_slots: Vec<ShardSlot>,
}

impl ObjectManifest {
    /// Total shard count (k + m).
    pub fn total_shards(&self) -> usize {
        self.shard_slots.len()
    }

    /// Data shard count (k).
    pub fn data_shards(&self) -> usize {
        self.shard_slots.len() - self.parity_shards
    }

    /// The user-visible object key this manifest describes.
    pub fn object_key(&self) -> String {
        if self.prefix.is_empty() || self.prefix == "." {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.prefix, self.file_name)
        }
    }

    /// Whether every slot has been stamped with a storage location.
    pub fn is_fully_resolved(&self) -> bool {
        self.shard_slots.iter().all(ShardSlot::is_resolved)
    }
}

/// Split a logical object key into its `(prefix, file_name)` address pair.
///
/// A key without a directory portion stores under the prefix `"."`, so that
/// every object has a non-empty partition key. No other normalization is
/// applied; both halves are stored verbatim.
pub fn split_object_key(key: &str) -> (String, String) {
    let trimmed = key.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((prefix, name)) => (prefix.to_string(), name.to_string()),
        None => (".".to_string(), trimmed.to_string()),
    }
}
