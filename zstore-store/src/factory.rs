//! Backend factory
//!
//! Builds drivers from bucket descriptors. S3 clients are cached per
//! region; the GCS client is process-wide and provided at factory
//! construction (credential acquisition happens in the caller, through the
//! SDK default chains).

use crate::driver::{BackendKind, ObjectStore};
use crate::gcs::GcsObjectStore;
use crate::memory::MemoryObjectStore;
use crate::s3::S3ObjectStore;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Region;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use zstore_core::error::{Result, ZstoreError};

/// Configured backend endpoint: a logical bucket plus the backend family
/// hosting it. Loaded at startup, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDescriptor {
    /// Physical bucket name.
    pub name: String,
    /// Backend family.
    pub kind: BackendKind,
    /// Backend region. Required for S3, optional otherwise.
    pub region: Option<String>,
}

impl BucketDescriptor {
    pub fn new(name: impl Into<String>, kind: BackendKind, region: Option<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            region,
        }
    }

    /// Parse a descriptor from a bucket string.
    ///
    /// Accepted forms: `s3://bucket`, `gs://bucket`, `s3:bucket`,
    /// `gcs:bucket`, or a bare `bucket` (defaults to S3).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some((scheme, name)) = input.split_once("://") {
            let name = name.trim();
            if name.is_empty() {
                return Err(ZstoreError::Config("bucket name cannot be empty".into()));
            }
            let kind = match scheme.to_ascii_lowercase().as_str() {
                "s3" => BackendKind::S3,
                "gs" => BackendKind::Gcs,
                other => return Err(ZstoreError::UnknownBackend(other.to_string())),
            };
            return Ok(Self::new(name, kind, None));
        }

        if let Some((kind, name)) = input.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                return Err(ZstoreError::Config("bucket name cannot be empty".into()));
            }
            let kind = BackendKind::from_str(&kind.trim().to_ascii_lowercase())?;
            return Ok(Self::new(name, kind, None));
        }

        if input.is_empty() {
            return Err(ZstoreError::Config("bucket name cannot be empty".into()));
        }
        Ok(Self::new(input, BackendKind::S3, None))
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Builds object store drivers from bucket descriptors.
pub struct StoreFactory {
    aws_config: SdkConfig,
    gcs_client: Option<google_cloud_storage::client::Client>,
    /// S3 clients are region-scoped; cache one per region.
    s3_clients: Mutex<HashMap<String, aws_sdk_s3::Client>>,
}

impl StoreFactory {
    pub fn new(
        aws_config: SdkConfig,
        gcs_client: Option<google_cloud_storage::client::Client>,
    ) -> Self {
        Self {
            aws_config,
            gcs_client,
            s3_clients: Mutex::new(HashMap::new()),
        }
    }

    /// Build a driver for the described bucket.
    pub fn build(&self, descriptor: &BucketDescriptor) -> Result<Arc<dyn ObjectStore>> {
        match descriptor.kind {
            BackendKind::S3 => {
                let region = descriptor
                    .region
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| ZstoreError::MissingRegion(descriptor.name.clone()))?;
                let client = self.s3_client_for(region);
                Ok(Arc::new(S3ObjectStore::new(client, descriptor.name.clone())))
            }
            BackendKind::Gcs => {
                let client = self.gcs_client.clone().ok_or_else(|| {
                    ZstoreError::BackendNotConfigured(format!(
                        "gcs client not provided (bucket: {})",
                        descriptor.name
                    ))
                })?;
                Ok(Arc::new(GcsObjectStore::new(client, descriptor.name.clone())))
            }
            BackendKind::Memory => Ok(Arc::new(MemoryObjectStore::new(descriptor.name.clone()))),
        }
    }

    /// Get or create the S3 client for a region.
    fn s3_client_for(&self, region: &str) -> aws_sdk_s3::Client {
        let mut clients = self.s3_clients.lock();
        if let Some(client) = clients.get(region) {
            return client.clone();
        }

        let config = aws_sdk_s3::config::Builder::from(&self.aws_config)
            .region(Region::new(region.to_string()))
            .build();
        let client = aws_sdk_s3::Client::from_conf(config);
        clients.insert(region.to_string(), client.clone());
        client
    }
}
