//! In-memory backend driver
//!
//! Used for testing and local smoke runs. Not persistent.

use crate::driver::{BackendKind, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use zstore_core::error::{Result, ZstoreError};
use zstore_core::sink::WriteAt;

/// In-memory object store
#[derive(Default)]
pub struct MemoryObjectStore {
    bucket_name: String,

    /// Object storage keyed by object key
    objects: RwLock<HashMap<String, Bytes>>,

    /// Operation counters
    uploads: AtomicU64,
    downloads: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryObjectStore {
    /// Create a new in-memory store for the given logical bucket name.
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            ..Default::default()
        }
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether an object exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Snapshot of all stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Keys stored under a prefix.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Remove a single object out-of-band (for fault-injection in tests).
    pub fn remove(&self, key: &str) -> bool {
        self.objects.write().remove(key).is_some()
    }

    /// Overwrite an object's bytes out-of-band (for corruption tests).
    pub fn corrupt(&self, key: &str, data: Bytes) -> bool {
        let mut objects = self.objects.write();
        if objects.contains_key(key) {
            objects.insert(key.to_string(), data);
            true
        } else {
            false
        }
    }

    /// (uploads, downloads, deletes) counters.
    pub fn op_counts(&self) -> (u64, u64, u64) {
        (
            self.uploads.load(Ordering::Relaxed),
            self.downloads.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, data: Bytes, _quiet: bool) -> Result<String> {
        self.objects.write().insert(key.to_string(), data);
        self.uploads.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{}/{}", self.bucket_name, key))
    }

    async fn download(&self, key: &str, sink: &dyn WriteAt, _quiet: bool) -> Result<u64> {
        let data = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ZstoreError::Backend(format!("object not found: {}", key)))?;
        sink.write_at(&data, 0)?;
        self.downloads.fetch_add(1, Ordering::Relaxed);
        Ok(data.len() as u64)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.objects.write().remove(key).is_some() {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let mut objects = self.objects.write();
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(prefix));
        let removed = before - objects.len();
        self.deletes.fetch_add(removed as u64, Ordering::Relaxed);
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}
