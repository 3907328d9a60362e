//! In-memory manifest store
//!
//! Mirrors the partition/sort key schema with a two-level ordered map.
//! Used for testing and development. Not persistent.

use crate::store::MetadataStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use zstore_core::error::{Result, ZstoreError};
use zstore_core::manifest::ObjectManifest;

/// In-memory manifest index
#[derive(Default)]
pub struct MemoryMetadataStore {
    /// prefix -> file_name -> manifest
    partitions: RwLock<BTreeMap<String, BTreeMap<String, ObjectManifest>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of manifests across all partitions.
    pub fn manifest_count(&self) -> usize {
        self.partitions.read().values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put(&self, manifest: &ObjectManifest) -> Result<()> {
        self.partitions
            .write()
            .entry(manifest.prefix.clone())
            .or_default()
            .insert(manifest.file_name.clone(), manifest.clone());
        Ok(())
    }

    async fn get(&self, prefix: &str, file_name: &str) -> Result<ObjectManifest> {
        self.partitions
            .read()
            .get(prefix)
            .and_then(|partition| partition.get(file_name))
            .cloned()
            .ok_or_else(|| ZstoreError::NotFound {
                prefix: prefix.to_string(),
                file_name: file_name.to_string(),
            })
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectManifest>> {
        Ok(self
            .partitions
            .read()
            .get(prefix)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, prefix: &str, file_name: &str) -> Result<()> {
        let mut partitions = self.partitions.write();
        if let Some(partition) = partitions.get_mut(prefix) {
            partition.remove(file_name);
            if partition.is_empty() {
                partitions.remove(prefix);
            }
        }
        Ok(())
    }
}
