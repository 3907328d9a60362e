//! Storage backend driver trait
//!
//! Defines the interface every backend implementation must follow. A driver
//! is scoped to a single bucket on a single backend and must be safe for
//! concurrent calls from multiple tasks.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::str::FromStr;
use zstore_core::error::{Result, ZstoreError};
use zstore_core::sink::WriteAt;

/// Backend family tag. Additional variants may be added without changing
/// callers; everything downstream of the factory goes through the trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    S3,
    Gcs,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ZstoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s3" => Ok(Self::S3),
            "gcs" => Ok(Self::Gcs),
            "memory" => Ok(Self::Memory),
            other => Err(ZstoreError::UnknownBackend(other.to_string())),
        }
    }
}

/// Async object store driver.
///
/// All implementations must be `Send + Sync`; a single driver instance is
/// shared by every concurrent shard transfer touching its bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write the full byte sequence under `key`.
    ///
    /// Returns the resolved location as `"<bucket>/<key>"`.
    async fn upload(&self, key: &str, data: Bytes, quiet: bool) -> Result<String>;

    /// Write the object's bytes into a random-access sink.
    ///
    /// Implementations with only sequential readers buffer the object and
    /// emit a single `write_at(all_bytes, 0)`. Returns the byte count
    /// written.
    async fn download(&self, key: &str, sink: &dyn WriteAt, quiet: bool) -> Result<u64>;

    /// Remove exactly one object. A missing key is not surfaced as a
    /// fatal error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List and delete every object whose key begins with `prefix`,
    /// paginating until exhaustion.
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Tag identifying the backend family.
    fn backend_kind(&self) -> BackendKind;

    /// Logical bucket name this driver is scoped to.
    fn bucket_name(&self) -> &str;
}
