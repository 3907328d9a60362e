//! Zstore Metadata Stores
//!
//! Durable, queryable manifest index keyed by `(prefix, file_name)`:
//! - `MetadataStore` trait for pluggable index backends
//! - `DynamoMetadataStore` for production (partition key `prefix`,
//!   sort key `file_name`)
//! - `MemoryMetadataStore` for testing

pub mod dynamo;
pub mod memory;
pub mod store;

pub use dynamo::DynamoMetadataStore;
pub use memory::MemoryMetadataStore;
pub use store::MetadataStore;
