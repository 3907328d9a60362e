//! Zstore Storage Backends
//!
//! Uniform drivers over disparate cloud object stores:
//! - `ObjectStore` trait for pluggable backends
//! - `S3ObjectStore` for S3-compatible stores
//! - `GcsObjectStore` for Google Cloud Storage
//! - `MemoryObjectStore` for testing and local smoke runs
//! - `StoreFactory` building drivers from bucket descriptors

pub mod driver;
pub mod factory;
pub mod gcs;
pub mod memory;
mod progress;
pub mod s3;

pub use driver::{BackendKind, ObjectStore};
pub use factory::{BucketDescriptor, StoreFactory};
pub use gcs::GcsObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
