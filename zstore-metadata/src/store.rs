//! Metadata store trait
//!
//! The manifest index maps the two-level address `(prefix, file_name)` to
//! one `ObjectManifest`. Partitioning by prefix and sorting by file name
//! gives the prefix listing an efficient range scan and guarantees address
//! uniqueness.

use async_trait::async_trait;
use zstore_core::error::Result;
use zstore_core::manifest::ObjectManifest;

/// Durable manifest index.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Write-replace a manifest. Last writer wins; there is no optimistic
    /// concurrency.
    async fn put(&self, manifest: &ObjectManifest) -> Result<()>;

    /// Fetch the manifest for one logical object. `NotFound` when absent.
    async fn get(&self, prefix: &str, file_name: &str) -> Result<ObjectManifest>;

    /// Every manifest whose prefix equals the argument exactly. This is a
    /// point-prefix list, not a recursive descent.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectManifest>>;

    /// Remove the manifest for one logical object.
    async fn delete(&self, prefix: &str, file_name: &str) -> Result<()>;
}
