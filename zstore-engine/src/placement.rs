//! Shard placement
//!
//! Deterministic mapping from a shard index to a backend bucket. The placer
//! sits between the engine and the drivers: uploads ask `place(i)` for the
//! next bucket, downloads resolve the bucket recorded in the manifest with
//! `get`. Everything downstream refers to buckets by name, never by
//! position, so alternative strategies (weighted, geographic,
//! performance-ranked) slot in behind the same trait.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use zstore_core::error::{Result, ZstoreError};
use zstore_store::ObjectStore;

/// Shard placement strategy.
///
/// Implementations must be thread-safe, and `place(i)` must be
/// deterministic for a fixed bucket set so that reconstruction can always
/// resolve the bucket a manifest names.
pub trait Placer: Send + Sync {
    /// Add a bucket and its driver. Called at startup; duplicate names are
    /// rejected.
    fn register_bucket(&self, bucket_name: &str, driver: Arc<dyn ObjectStore>) -> Result<()>;

    /// Select the bucket for a shard index.
    fn place(&self, shard_index: usize) -> Result<(String, Arc<dyn ObjectStore>)>;

    /// Exact driver lookup by bucket name, used during downloads when the
    /// bucket is known from the manifest.
    fn get(&self, bucket_name: &str) -> Result<Arc<dyn ObjectStore>>;

    /// All registered bucket names, in registration order. Used for
    /// fan-out cleanup across every bucket.
    fn list_buckets(&self) -> Vec<String>;
}

#[derive(Default)]
struct Registry {
    drivers: HashMap<String, Arc<dyn ObjectStore>>,
    bucket_names: Vec<String>,
}

/// Round-robin shard placement: `place(i) = buckets[i % n]` over the
/// insertion-ordered bucket list.
#[derive(Default)]
pub struct RoundRobinPlacer {
    registry: RwLock<Registry>,
}

impl RoundRobinPlacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Placer for RoundRobinPlacer {
    fn register_bucket(&self, bucket_name: &str, driver: Arc<dyn ObjectStore>) -> Result<()> {
        let mut registry = self.registry.write();
        if registry.drivers.contains_key(bucket_name) {
            return Err(ZstoreError::BucketAlreadyRegistered(bucket_name.to_string()));
        }
        registry.drivers.insert(bucket_name.to_string(), driver);
        registry.bucket_names.push(bucket_name.to_string());
        Ok(())
    }

    fn place(&self, shard_index: usize) -> Result<(String, Arc<dyn ObjectStore>)> {
        let registry = self.registry.read();
        if registry.bucket_names.is_empty() {
            return Err(ZstoreError::NoBucketsRegistered);
        }

        let bucket_name = &registry.bucket_names[shard_index % registry.bucket_names.len()];
        let driver = registry.drivers[bucket_name].clone();
        Ok((bucket_name.clone(), driver))
    }

    fn get(&self, bucket_name: &str) -> Result<Arc<dyn ObjectStore>> {
        self.registry
            .read()
            .drivers
            .get(bucket_name)
            .cloned()
            .ok_or_else(|| ZstoreError::UnknownBucket(bucket_name.to_string()))
    }

    fn list_buckets(&self) -> Vec<String> {
        self.registry.read().bucket_names.clone()
    }
}
