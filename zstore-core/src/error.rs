//! Error types for Zstore
//!
//! Provides a unified error type for all Zstore operations.

use thiserror::Error;

/// Result type alias for Zstore operations
pub type Result<T> = std::result::Result<T, ZstoreError>;

/// Unified error type for Zstore
#[derive(Error, Debug)]
pub enum ZstoreError {
    // ===== Codec Errors =====
    #[error("cannot upload empty payload")]
    EmptyPayload,

    #[error("erasure encode error: {0}")]
    Encode(String),

    #[error("erasure decode error: {0}")]
    Decode(String),

    #[error("insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    #[error("shard integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailed { expected: String, actual: String },

    // ===== Placement Errors =====
    #[error("no buckets registered")]
    NoBucketsRegistered,

    #[error("no bucket registered under name: {0}")]
    UnknownBucket(String),

    #[error("bucket already registered: {0}")]
    BucketAlreadyRegistered(String),

    // ===== Factory Errors =====
    #[error("region is required for s3 bucket: {0}")]
    MissingRegion(String),

    #[error("unsupported backend kind: {0}")]
    UnknownBackend(String),

    #[error("backend not configured: {0}")]
    BackendNotConfigured(String),

    // ===== Engine Errors =====
    #[error("shard upload failed: {0}")]
    UploadFailed(String),

    // ===== Metadata Errors =====
    #[error("object not found: {prefix}/{file_name}")]
    NotFound { prefix: String, file_name: String },

    #[error("manifest write failed: {0}")]
    ManifestWrite(String),

    #[error("manifest delete failed: {0}")]
    ManifestDelete(String),

    // ===== Backend Errors =====
    #[error("backend error: {0}")]
    Backend(String),

    // ===== Configuration Errors =====
    #[error("configuration error: {0}")]
    Config(String),

    // ===== I/O Errors =====
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZstoreError::InsufficientShards {
            available: 3,
            required: 4,
        };
        assert_eq!(err.to_string(), "insufficient shards: have 3, need 4");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ZstoreError = io_err.into();
        assert!(matches!(err, ZstoreError::Io(_)));
    }

    #[test]
    fn test_not_found_display() {
        let err = ZstoreError::NotFound {
            prefix: "a/b".to_string(),
            file_name: "c.bin".to_string(),
        };
        assert_eq!(err.to_string(), "object not found: a/b/c.bin");
    }
}
