//! Zstore Object Engine
//!
//! The coordinator visible to callers of the core:
//! - `Placer` maps shard indices to backend buckets (round-robin default)
//! - `ObjectEngine` orchestrates erasure-coded upload, download, delete,
//!   and list with fail-fast uploads and dynamically-refilled,
//!   early-terminating downloads
//! - `RawObjectService` is the non-erasure-coded passthrough

pub mod engine;
pub mod placement;
pub mod raw;

pub use engine::{ObjectEngine, UploadOptions};
pub use placement::{Placer, RoundRobinPlacer};
pub use raw::RawObjectService;
