//! Configuration loading
//!
//! Configuration is a TOML file plus environment overrides. Search order:
//! the `--config` flag, `$ZSTORE_CONFIG`, `./zstore.toml`, then
//! `~/.zstore/config.toml`; missing files fall back to defaults.
//!
//! Config file format:
//! ```toml
//! log_level = "info"
//! dynamodb_table = "zstore-objects"
//! aws_region = "us-east-1"
//!
//! [buckets.shards-a]
//! bucket_name = "zstore-shards-a"
//! platform = "s3"        # s3 | gcs | memory
//! region = "us-east-1"   # required for s3
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zstore_store::{BackendKind, BucketDescriptor};

/// One configured backend bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Physical bucket name.
    pub bucket_name: String,
    /// Backend platform: "s3", "gcs", or "memory".
    pub platform: String,
    /// Backend region. Required for s3.
    #[serde(default)]
    pub region: Option<String>,
}

impl BucketConfig {
    pub fn to_descriptor(&self) -> Result<BucketDescriptor> {
        let kind = BackendKind::from_str(&self.platform.to_lowercase())
            .with_context(|| format!("bucket platform '{}' is not supported", self.platform))?;
        Ok(BucketDescriptor::new(
            self.bucket_name.clone(),
            kind,
            self.region.clone(),
        ))
    }
}

/// Zstore configuration.
///
/// Buckets are held in a BTreeMap so registration order is the sorted key
/// order — stable across restarts, which keeps shard placement
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZstoreConfig {
    /// Log verbosity: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// DynamoDB table holding object manifests.
    #[serde(default = "default_dynamodb_table")]
    pub dynamodb_table: String,

    /// Default AWS region for the metadata store and raw operations.
    #[serde(default)]
    pub aws_region: Option<String>,

    /// Configured shard buckets, keyed by logical name.
    #[serde(default)]
    pub buckets: BTreeMap<String, BucketConfig>,
}

impl Default for ZstoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dynamodb_table: default_dynamodb_table(),
            aws_region: None,
            buckets: BTreeMap::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_dynamodb_table() -> String {
    "zstore-objects".to_string()
}

impl ZstoreConfig {
    /// Load configuration from the first config file found, then apply
    /// environment overrides (`LOG_LEVEL`, `DYNAMODB_TABLE`, `AWS_REGION`).
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_path(explicit_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    fn resolve_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("ZSTORE_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let local = PathBuf::from("zstore.toml");
        if local.exists() {
            return Some(local);
        }

        let home = dirs::home_dir()?.join(".zstore").join("config.toml");
        home.exists().then_some(home)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Ok(table) = std::env::var("DYNAMODB_TABLE") {
            self.dynamodb_table = table;
        }
        if let Ok(region) = std::env::var("AWS_REGION") {
            self.aws_region = Some(region);
        }
    }

    /// Whether any configured bucket runs on GCS (decides whether the GCS
    /// client is built at startup).
    pub fn has_gcs_bucket(&self) -> bool {
        self.buckets
            .values()
            .any(|b| b.platform.eq_ignore_ascii_case("gcs"))
    }

    /// Look up the region for a raw-mode bucket: a configured bucket with
    /// a matching physical name wins, the global region is the fallback.
    pub fn region_for_bucket(&self, bucket_name: &str) -> Option<String> {
        self.buckets
            .values()
            .find(|b| b.bucket_name == bucket_name)
            .and_then(|b| b.region.clone())
            .or_else(|| self.aws_region.clone())
    }
}
