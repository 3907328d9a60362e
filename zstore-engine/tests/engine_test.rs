//! End-to-end engine tests over in-memory backends
//!
//! Exercises the full pipeline: payload → shards → placement → upload →
//! manifest → download → reconstruction, plus the failure-tolerance and
//! cleanup behaviors around it.
//!
//! Run with: cargo test --package zstore-engine --test engine_test

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use zstore_core::error::{Result, ZstoreError};
use zstore_core::fingerprint::crc64_iso_hex16;
use zstore_core::sink::{SharedBuffer, WriteAt};
use zstore_engine::{ObjectEngine, Placer, RoundRobinPlacer, UploadOptions};
use zstore_metadata::{MemoryMetadataStore, MetadataStore};
use zstore_store::{BackendKind, MemoryObjectStore, ObjectStore};

/// Generate a payload of the byte pattern 0x00..0xFF repeated.
fn generate_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

struct Harness {
    engine: ObjectEngine,
    buckets: Vec<Arc<MemoryObjectStore>>,
    metadata: Arc<MemoryMetadataStore>,
}

fn harness(bucket_names: &[&str]) -> Harness {
    let placer = Arc::new(RoundRobinPlacer::new());
    let buckets: Vec<Arc<MemoryObjectStore>> = bucket_names
        .iter()
        .map(|name| Arc::new(MemoryObjectStore::new(*name)))
        .collect();
    for (name, store) in bucket_names.iter().zip(&buckets) {
        placer.register_bucket(name, store.clone()).unwrap();
    }

    let metadata = Arc::new(MemoryMetadataStore::new());
    let engine = ObjectEngine::new(placer, metadata.clone());
    Harness {
        engine,
        buckets,
        metadata,
    }
}

fn options(data_shards: usize, parity_shards: usize) -> UploadOptions {
    UploadOptions {
        quiet: true,
        data_shards,
        parity_shards,
        concurrency: 3,
    }
}

#[tokio::test]
async fn test_small_round_trip() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(1024);

    h.engine
        .upload("data/obj.bin", payload.as_slice(), options(4, 2))
        .await
        .unwrap();

    // Manifest has 6 fully-resolved slots, round-robin across the buckets.
    let manifest = h.metadata.get("data", "obj.bin").await.unwrap();
    assert_eq!(manifest.total_shards(), 6);
    assert_eq!(manifest.data_shards(), 4);
    assert_eq!(manifest.original_size, 1024);
    assert!(manifest.is_fully_resolved());
    for (i, slot) in manifest.shard_slots.iter().enumerate() {
        assert_eq!(slot.bucket_name, format!("bucket-{}", i % 3));
        assert_eq!(slot.backend_kind, "memory");
        assert_eq!(slot.storage_key, format!("data/obj.bin/{}", slot.hash));
    }

    let sink = SharedBuffer::new();
    h.engine
        .download("data/obj.bin", &sink, true)
        .await
        .unwrap();
    assert_eq!(sink.to_vec(), payload);
}

#[tokio::test]
async fn test_download_tolerates_parity_many_losses() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(1024);

    h.engine
        .upload("data/obj.bin", payload.as_slice(), options(4, 2))
        .await
        .unwrap();

    // Manually delete the shard objects behind slots 0 and 5.
    let manifest = h.metadata.get("data", "obj.bin").await.unwrap();
    for i in [0, 5] {
        let slot = &manifest.shard_slots[i];
        let bucket = h
            .buckets
            .iter()
            .find(|b| b.bucket_name() == slot.bucket_name)
            .unwrap();
        assert!(bucket.remove(&slot.storage_key));
    }

    let sink = SharedBuffer::new();
    h.engine
        .download("data/obj.bin", &sink, true)
        .await
        .unwrap();
    assert_eq!(sink.to_vec(), payload);
}

#[tokio::test]
async fn test_download_fails_beyond_parity_budget() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(1024);

    h.engine
        .upload("data/obj.bin", payload.as_slice(), options(4, 2))
        .await
        .unwrap();

    // Delete m + 1 shards; reconstruction becomes impossible.
    let manifest = h.metadata.get("data", "obj.bin").await.unwrap();
    for i in [0, 1, 2] {
        let slot = &manifest.shard_slots[i];
        let bucket = h
            .buckets
            .iter()
            .find(|b| b.bucket_name() == slot.bucket_name)
            .unwrap();
        assert!(bucket.remove(&slot.storage_key));
    }

    let sink = SharedBuffer::new();
    let result = h.engine.download("data/obj.bin", &sink, true).await;
    assert!(matches!(
        result,
        Err(ZstoreError::InsufficientShards {
            available: 3,
            required: 4
        })
    ));
}

#[tokio::test]
async fn test_overwrite_leaves_no_orphans() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload_a = generate_payload(1024);
    let payload_b = generate_payload(2000);

    h.engine
        .upload("a/b.bin", payload_a.as_slice(), options(4, 2))
        .await
        .unwrap();
    h.engine
        .upload("a/b.bin", payload_b.as_slice(), options(4, 2))
        .await
        .unwrap();

    // Download returns the second payload.
    let sink = SharedBuffer::new();
    h.engine.download("a/b.bin", &sink, true).await.unwrap();
    assert_eq!(sink.to_vec(), payload_b);

    // Exactly the 6 current shards exist under the object prefix; the
    // first incarnation was wiped.
    let total: usize = h
        .buckets
        .iter()
        .map(|b| b.keys_with_prefix("a/b.bin").len())
        .sum();
    assert_eq!(total, 6);

    let manifest = h.metadata.get("a", "b.bin").await.unwrap();
    for slot in &manifest.shard_slots {
        let bucket = h
            .buckets
            .iter()
            .find(|b| b.bucket_name() == slot.bucket_name)
            .unwrap();
        assert!(bucket.contains(&slot.storage_key));
    }
}

#[tokio::test]
async fn test_empty_payload_rejected() {
    let h = harness(&["bucket-0"]);

    let result = h
        .engine
        .upload("a/empty.bin", &b""[..], options(4, 2))
        .await;
    assert!(matches!(result, Err(ZstoreError::EmptyPayload)));
    assert_eq!(h.metadata.manifest_count(), 0);
}

#[tokio::test]
async fn test_delete_removes_shards_and_manifest() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(512);

    h.engine
        .upload("docs/report.pdf", payload.as_slice(), options(4, 2))
        .await
        .unwrap();
    h.engine.delete("docs/report.pdf").await.unwrap();

    // Download now reports NotFound.
    let sink = SharedBuffer::new();
    let result = h.engine.download("docs/report.pdf", &sink, true).await;
    assert!(matches!(result, Err(ZstoreError::NotFound { .. })));

    // The listing no longer contains the object.
    let listed = h.engine.list("docs").await.unwrap();
    assert!(listed.iter().all(|m| m.file_name != "report.pdf"));

    // No shard objects survive in any bucket.
    for bucket in &h.buckets {
        assert!(bucket.keys_with_prefix("docs/report.pdf").is_empty());
    }
}

#[tokio::test]
async fn test_list_by_prefix() {
    let h = harness(&["bucket-0", "bucket-1"]);

    for name in ["one.bin", "two.bin"] {
        h.engine
            .upload(
                &format!("data/{}", name),
                generate_payload(100).as_slice(),
                options(2, 1),
            )
            .await
            .unwrap();
    }
    h.engine
        .upload("data/nested/three.bin", generate_payload(100).as_slice(), options(2, 1))
        .await
        .unwrap();

    let listed = h.engine.list("data").await.unwrap();
    let names: Vec<&str> = listed.iter().map(|m| m.file_name.as_str()).collect();
    assert_eq!(names, vec!["one.bin", "two.bin"]);

    let nested = h.engine.list("data/nested").await.unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].file_name, "three.bin");
}

#[tokio::test]
async fn test_key_without_directory() {
    let h = harness(&["bucket-0"]);
    let payload = generate_payload(64);

    h.engine
        .upload("plain.bin", payload.as_slice(), options(2, 1))
        .await
        .unwrap();

    // Stored under the "." partition.
    let manifest = h.metadata.get(".", "plain.bin").await.unwrap();
    assert_eq!(manifest.object_key(), "plain.bin");

    let sink = SharedBuffer::new();
    h.engine.download("plain.bin", &sink, true).await.unwrap();
    assert_eq!(sink.to_vec(), payload);
}

#[tokio::test]
async fn test_early_termination_stops_extra_fetches() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(4096);

    h.engine
        .upload("data/big.bin", payload.as_slice(), options(4, 2))
        .await
        .unwrap();

    // With sequential fetching, the fifth and sixth shards are never
    // requested: the download cancels as soon as four shards land.
    let mut engine = h.engine;
    engine.set_concurrency(1);

    let before: u64 = h.buckets.iter().map(|b| b.op_counts().1).sum();
    let sink = SharedBuffer::new();
    engine.download("data/big.bin", &sink, true).await.unwrap();
    assert_eq!(sink.to_vec(), payload);

    let after: u64 = h.buckets.iter().map(|b| b.op_counts().1).sum();
    assert_eq!(after - before, 4);
}

#[tokio::test]
async fn test_integrity_verification_masks_corrupt_shard() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(1024);

    h.engine
        .upload("data/obj.bin", payload.as_slice(), options(4, 2))
        .await
        .unwrap();

    // Flip bytes in one stored shard.
    let manifest = h.metadata.get("data", "obj.bin").await.unwrap();
    let slot = &manifest.shard_slots[1];
    let bucket = h
        .buckets
        .iter()
        .find(|b| b.bucket_name() == slot.bucket_name)
        .unwrap();
    assert!(bucket.corrupt(&slot.storage_key, Bytes::from(vec![0xFFu8; 256])));

    let mut engine = h.engine;
    engine.set_verify_integrity(true);

    // The corrupt shard is treated as missing; parity covers the loss.
    let sink = SharedBuffer::new();
    engine.download("data/obj.bin", &sink, true).await.unwrap();
    assert_eq!(sink.to_vec(), payload);
}

#[tokio::test]
async fn test_integrity_verification_beyond_budget_fails() {
    let h = harness(&["bucket-0", "bucket-1", "bucket-2"]);
    let payload = generate_payload(1024);

    h.engine
        .upload("data/obj.bin", payload.as_slice(), options(4, 2))
        .await
        .unwrap();

    let manifest = h.metadata.get("data", "obj.bin").await.unwrap();
    for i in [0, 1, 2] {
        let slot = &manifest.shard_slots[i];
        let bucket = h
            .buckets
            .iter()
            .find(|b| b.bucket_name() == slot.bucket_name)
            .unwrap();
        assert!(bucket.corrupt(&slot.storage_key, Bytes::from(vec![0xFFu8; 256])));
    }

    let mut engine = h.engine;
    engine.set_verify_integrity(true);

    let sink = SharedBuffer::new();
    let result = engine.download("data/obj.bin", &sink, true).await;
    assert!(matches!(result, Err(ZstoreError::InsufficientShards { .. })));
}

#[tokio::test]
async fn test_round_trip_with_awkward_sizes() {
    let h = harness(&["bucket-0", "bucket-1"]);

    // Sizes that do not divide evenly, including payloads smaller than k.
    for size in [1usize, 3, 5, 1023, 1025] {
        let key = format!("sizes/obj-{}.bin", size);
        let payload = generate_payload(size);

        h.engine
            .upload(&key, payload.as_slice(), options(4, 2))
            .await
            .unwrap();

        let sink = SharedBuffer::new();
        h.engine.download(&key, &sink, true).await.unwrap();
        assert_eq!(sink.to_vec(), payload, "size {}", size);
    }
}

/// Driver whose uploads always fail; downloads and deletes succeed.
struct FailingObjectStore {
    bucket_name: String,
}

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn upload(&self, _key: &str, _data: Bytes, _quiet: bool) -> Result<String> {
        Err(ZstoreError::UploadFailed("injected failure".to_string()))
    }

    async fn download(&self, key: &str, _sink: &dyn WriteAt, _quiet: bool) -> Result<u64> {
        Err(ZstoreError::Backend(format!("object not found: {}", key)))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}

#[tokio::test]
async fn test_any_shard_upload_failure_aborts_publication() {
    let placer = Arc::new(RoundRobinPlacer::new());
    placer
        .register_bucket("good", Arc::new(MemoryObjectStore::new("good")))
        .unwrap();
    placer
        .register_bucket(
            "bad",
            Arc::new(FailingObjectStore {
                bucket_name: "bad".to_string(),
            }),
        )
        .unwrap();
    placer
        .register_bucket("good-2", Arc::new(MemoryObjectStore::new("good-2")))
        .unwrap();

    let metadata = Arc::new(MemoryMetadataStore::new());
    let engine = ObjectEngine::new(placer, metadata.clone());

    // Two of six shards land in the failing bucket: within the parity
    // budget, but the object must still not be published.
    let payload = generate_payload(1024);
    let result = engine
        .upload("a/b.bin", payload.as_slice(), options(4, 2))
        .await;
    assert!(matches!(result, Err(ZstoreError::UploadFailed(_))));
    assert_eq!(metadata.manifest_count(), 0);
}

#[tokio::test]
async fn test_shard_hashes_match_manifest() {
    let h = harness(&["bucket-0"]);
    let payload = generate_payload(777);

    h.engine
        .upload("check/hashes.bin", payload.as_slice(), options(3, 2))
        .await
        .unwrap();

    // Every stored shard's bytes hash to its manifest slot entry.
    let manifest = h.metadata.get("check", "hashes.bin").await.unwrap();
    for slot in &manifest.shard_slots {
        let sink = SharedBuffer::new();
        h.buckets[0]
            .download(&slot.storage_key, &sink, true)
            .await
            .unwrap();
        assert_eq!(crc64_iso_hex16(&sink.to_vec()), slot.hash);
    }
}
