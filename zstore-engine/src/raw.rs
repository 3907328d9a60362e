//! Raw passthrough service
//!
//! Direct single-bucket operations with no erasure coding, sharding, or
//! manifest overhead. Backs the `*-raw` CLI commands for simple storage
//! without fault-tolerance requirements.

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;
use zstore_core::error::Result;
use zstore_core::sink::WriteAt;
use zstore_store::{BucketDescriptor, ObjectStore, StoreFactory};

/// Direct object operations against a single bucket.
pub struct RawObjectService {
    factory: Arc<StoreFactory>,
}

impl RawObjectService {
    pub fn new(factory: Arc<StoreFactory>) -> Self {
        Self { factory }
    }

    /// Upload a payload directly under `key`. Returns the resolved
    /// `"<bucket>/<key>"` location.
    pub async fn upload<R>(
        &self,
        descriptor: &BucketDescriptor,
        key: &str,
        mut reader: R,
        quiet: bool,
    ) -> Result<String>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).await?;
        debug!(bucket = %descriptor.name, key, bytes = payload.len(), "raw upload");

        let driver = self.factory.build(descriptor)?;
        driver.upload(key, Bytes::from(payload), quiet).await
    }

    /// Download an object directly into the sink. Returns the byte count.
    pub async fn download(
        &self,
        descriptor: &BucketDescriptor,
        key: &str,
        sink: &dyn WriteAt,
        quiet: bool,
    ) -> Result<u64> {
        debug!(bucket = %descriptor.name, key, "raw download");
        let driver = self.factory.build(descriptor)?;
        driver.download(key, sink, quiet).await
    }

    /// Delete a single object.
    pub async fn delete(&self, descriptor: &BucketDescriptor, key: &str) -> Result<()> {
        debug!(bucket = %descriptor.name, key, "raw delete");
        let driver = self.factory.build(descriptor)?;
        driver.delete(key).await
    }
}
