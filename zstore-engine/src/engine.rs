//! Erasure-coded object engine
//!
//! Binds the codec, the placer, the metadata index, and the backend
//! drivers into the operations callers see: upload, download, delete,
//! list.
//!
//! Upload fans shards out under a semaphore and fails fast against the
//! parity budget: any shard failure aborts the object (peers are allowed
//! to finish naturally — leftover shards are self-cleaning because the
//! next upload of the same key wipes its prefix first).
//!
//! Download keeps ~`concurrency` fetches in flight, claiming the next
//! shard index whenever a worker finishes, and cancels the remaining
//! fetches the moment enough shards have landed for reconstruction.

use crate::placement::Placer;
use bytes::Bytes;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use zstore_core::erasure::{self, ErasureCodec};
use zstore_core::error::{Result, ZstoreError};
use zstore_core::fingerprint::crc64_iso_hex16;
use zstore_core::manifest::{split_object_key, ObjectManifest};
use zstore_core::sink::WriteAt;
use zstore_core::{DEFAULT_CONCURRENCY, DEFAULT_DATA_SHARDS, DEFAULT_PARITY_SHARDS};
use zstore_metadata::MetadataStore;
use zstore_store::ObjectStore;

/// Per-call options for an upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Suppress progress reporting in the drivers.
    pub quiet: bool,
    /// Number of data shards (k).
    pub data_shards: usize,
    /// Number of parity shards (m).
    pub parity_shards: usize,
    /// Maximum concurrent shard uploads.
    pub concurrency: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            data_shards: DEFAULT_DATA_SHARDS,
            parity_shards: DEFAULT_PARITY_SHARDS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// The erasure-coded object engine.
pub struct ObjectEngine {
    placer: Arc<dyn Placer>,
    metadata: Arc<dyn MetadataStore>,
    /// Download concurrency. Applied per call; never changes mid-call.
    concurrency: usize,
    /// Verify the CRC64 of every fetched shard against its manifest slot.
    /// Off by default: it doubles the bytes pushed through the CPU on the
    /// download path.
    verify_integrity: bool,
}

impl ObjectEngine {
    pub fn new(placer: Arc<dyn Placer>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            placer,
            metadata,
            concurrency: DEFAULT_CONCURRENCY,
            verify_integrity: false,
        }
    }

    /// Set the download concurrency used by subsequent calls.
    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.concurrency = concurrency.max(1);
    }

    /// Enable or disable per-shard integrity verification on download.
    pub fn set_verify_integrity(&mut self, verify: bool) {
        self.verify_integrity = verify;
    }

    /// Upload a logical object across the registered buckets.
    ///
    /// Reads the full payload, erasure-codes it, wipes any prior
    /// incarnation of the key (best-effort), uploads the shards
    /// concurrently, and publishes the manifest only after every shard
    /// has landed.
    #[instrument(skip(self, reader, options), fields(key = %object_key))]
    pub async fn upload<R>(&self, object_key: &str, mut reader: R, options: UploadOptions) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload).await?;
        if payload.is_empty() {
            return Err(ZstoreError::EmptyPayload);
        }
        debug!(bytes = payload.len(), "read payload");

        let codec = ErasureCodec::new(options.data_shards, options.parity_shards)?;
        let (shards, mut manifest) = codec.encode(&payload)?;
        drop(payload);

        let (prefix, file_name) = split_object_key(object_key);
        manifest.prefix = prefix;
        manifest.file_name = file_name;

        // Best-effort wipe of any prior incarnation under this key. The
        // manifest write below is the true authority; orphans it cannot
        // reach are garbage, not danger.
        for bucket_name in self.placer.list_buckets() {
            if let Ok(driver) = self.placer.get(&bucket_name) {
                if let Err(e) = driver.delete_prefix(object_key).await {
                    warn!(bucket = %bucket_name, error = %e, "pre-upload cleanup failed");
                }
            }
        }

        self.upload_shards(object_key, shards, &mut manifest, &options)
            .await?;

        match self.metadata.put(&manifest).await {
            Ok(()) => Ok(()),
            Err(e @ ZstoreError::ManifestWrite(_)) => Err(e),
            Err(e) => Err(ZstoreError::ManifestWrite(e.to_string())),
        }
    }

    /// Download a logical object and write it contiguously at offset 0 of
    /// the sink. No partial writes are observable before the whole payload
    /// is reconstructed.
    #[instrument(skip(self, sink), fields(key = %object_key))]
    pub async fn download(&self, object_key: &str, sink: &dyn WriteAt, quiet: bool) -> Result<()> {
        let (prefix, file_name) = split_object_key(object_key);
        let manifest = self.metadata.get(&prefix, &file_name).await?;
        debug!(
            slots = manifest.total_shards(),
            original_size = manifest.original_size,
            "fetched manifest"
        );

        let temp_shards = self.download_shards(&manifest, quiet).await?;

        let mut sparse: Vec<Option<Vec<u8>>> = Vec::with_capacity(manifest.total_shards());
        for path in temp_shards.paths() {
            match path {
                Some(p) => sparse.push(Some(tokio::fs::read(p).await?)),
                None => sparse.push(None),
            }
        }
        let payload = erasure::decode(&mut sparse, &manifest)?;

        sink.write_at(&payload, 0)?;
        Ok(())
        // temp_shards drops here, removing every temp file.
    }

    /// Delete a logical object: wipe its shard prefix in every registered
    /// bucket (best-effort), then remove the manifest. The manifest
    /// deletion error propagates.
    #[instrument(skip(self), fields(key = %object_key))]
    pub async fn delete(&self, object_key: &str) -> Result<()> {
        for bucket_name in self.placer.list_buckets() {
            match self.placer.get(&bucket_name) {
                Ok(driver) => {
                    if let Err(e) = driver.delete_prefix(object_key).await {
                        warn!(bucket = %bucket_name, error = %e, "failed to delete shards in bucket");
                    }
                }
                Err(e) => {
                    warn!(bucket = %bucket_name, error = %e, "bucket lookup failed during delete")
                }
            }
        }

        let (prefix, file_name) = split_object_key(object_key);
        self.metadata.delete(&prefix, &file_name).await
    }

    /// List every manifest stored under a prefix (exact partition match).
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectManifest>> {
        self.metadata.list_by_prefix(prefix).await
    }

    /// Upload all shards concurrently and stamp the manifest slots with
    /// the resolved storage locations.
    async fn upload_shards(
        &self,
        object_key: &str,
        shards: Vec<Bytes>,
        manifest: &mut ObjectManifest,
        options: &UploadOptions,
    ) -> Result<()> {
        let total = shards.len();
        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let (result_tx, mut result_rx) = mpsc::channel(total);

        for (i, shard) in shards.into_iter().enumerate() {
            // Shard storage key: content-addressed beneath the object key,
            // so delete_prefix(object_key) erases every shard.
            let shard_key = format!("{}/{}", object_key, manifest.shard_slots[i].hash);
            let placer = self.placer.clone();
            let semaphore = semaphore.clone();
            let result_tx = result_tx.clone();
            let quiet = options.quiet;

            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = async {
                    let (bucket_name, driver) = placer.place(i)?;
                    let location = driver.upload(&shard_key, shard, quiet).await?;
                    // Location format is "<bucket>/<actual-key>".
                    let storage_key = location
                        .split_once('/')
                        .map(|(_, key)| key.to_string())
                        .unwrap_or(location);
                    Ok::<ShardUploadResult, ZstoreError>(ShardUploadResult {
                        index: i,
                        backend_kind: driver.backend_kind().to_string(),
                        bucket_name,
                        storage_key,
                    })
                }
                .await;
                let _ = result_tx.send(result).await;
            });
        }
        drop(result_tx);

        // Fail fast against the parity budget while workers report. Any
        // failure aborts the object; once failures exceed the parity count
        // there is no point waiting for the rest.
        let mut failures = 0usize;
        let mut first_error: Option<ZstoreError> = None;
        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            match result {
                Ok(placed) => results.push(placed),
                Err(e) => {
                    warn!(error = %e, "shard upload failed");
                    failures += 1;
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    if failures > options.parity_shards {
                        if let Some(err) = first_error.take() {
                            return Err(err);
                        }
                    }
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        for placed in results {
            let slot = &mut manifest.shard_slots[placed.index];
            slot.backend_kind = placed.backend_kind;
            slot.bucket_name = placed.bucket_name;
            slot.storage_key = placed.storage_key;
        }
        Ok(())
    }

    /// Fetch shards to temp files with dynamic concurrency and early
    /// termination. Returns an index-ordered set of temp paths holding at
    /// least `data_shards` fetched shards.
    async fn download_shards(&self, manifest: &ObjectManifest, quiet: bool) -> Result<TempShards> {
        let total = manifest.total_shards();
        let min_needed = manifest.data_shards();
        let concurrency = self.concurrency.max(1).min(total.max(1));

        let fetcher = Arc::new(ShardFetcher {
            placer: self.placer.clone(),
            manifest: Arc::new(manifest.clone()),
            state: Mutex::new(DownloadState {
                successful: 0,
                next_shard_index: concurrency,
                temp_paths: vec![None; total],
            }),
            cancel: CancellationToken::new(),
            min_needed,
            quiet,
            verify: self.verify_integrity,
        });

        // Initial batch: one worker per slot up to the concurrency cap.
        // Each worker claims further indices as it finishes.
        let mut handles = Vec::with_capacity(concurrency);
        for i in 0..concurrency {
            let fetcher = fetcher.clone();
            handles.push(tokio::spawn(async move { fetcher.run(i).await }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "shard fetch task panicked");
            }
        }

        let (successful, temp_paths) = {
            let mut state = fetcher.state.lock();
            (state.successful, std::mem::take(&mut state.temp_paths))
        };
        let temp_shards = TempShards { paths: temp_paths };
        debug!(successful, min_needed, "shard downloads finished");

        if successful < min_needed {
            // temp_shards drops on return, removing the partial set.
            return Err(ZstoreError::InsufficientShards {
                available: successful,
                required: min_needed,
            });
        }
        Ok(temp_shards)
    }
}

struct ShardUploadResult {
    index: usize,
    backend_kind: String,
    bucket_name: String,
    storage_key: String,
}

/// Download bookkeeping shared by all fetch workers, guarded by one mutex.
struct DownloadState {
    successful: usize,
    next_shard_index: usize,
    temp_paths: Vec<Option<PathBuf>>,
}

/// One object download's fetch machinery: placer, manifest, shared state,
/// and the cancellation signal raised on early termination.
struct ShardFetcher {
    placer: Arc<dyn Placer>,
    manifest: Arc<ObjectManifest>,
    state: Mutex<DownloadState>,
    cancel: CancellationToken,
    min_needed: usize,
    quiet: bool,
    verify: bool,
}

impl ShardFetcher {
    /// Worker loop: fetch the starting index, then keep claiming the next
    /// unfetched index while more shards are still needed.
    async fn run(self: Arc<Self>, start_index: usize) {
        let mut index = Some(start_index);
        while let Some(i) = index {
            if self.cancel.is_cancelled() {
                break;
            }

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.fetch_one(i) => result,
            };

            let mut state = self.state.lock();
            match fetched {
                Ok(path) => {
                    state.temp_paths[i] = Some(path);
                    state.successful += 1;
                    debug!(
                        shard = i,
                        successful = state.successful,
                        needed = self.min_needed,
                        "shard fetched"
                    );
                    // Early termination: enough shards for reconstruction,
                    // further fetches are pure waste.
                    if state.successful >= self.min_needed {
                        self.cancel.cancel();
                        break;
                    }
                }
                Err(e) => {
                    warn!(shard = i, error = %e, "shard fetch failed");
                }
            }

            // Claim the next shard index while more are needed and
            // available; otherwise let this worker wind down.
            index = if state.successful < self.min_needed
                && state.next_shard_index < self.manifest.total_shards()
            {
                let next = state.next_shard_index;
                state.next_shard_index += 1;
                Some(next)
            } else {
                None
            };
        }
    }

    /// Fetch one shard into a fresh temp file. On every failure path —
    /// including this future being dropped by cancellation — the temp file
    /// is removed; only a fully fetched (and optionally verified) shard is
    /// persisted.
    async fn fetch_one(&self, i: usize) -> Result<PathBuf> {
        let slot = &self.manifest.shard_slots[i];
        let driver = self.placer.get(&slot.bucket_name)?;

        // NamedTempFile removes itself on drop; keep() below defuses that
        // once the shard is known good.
        let temp = tempfile::Builder::new()
            .prefix(&format!("shard_{}_", i))
            .suffix(".tmp")
            .tempfile()?;

        driver
            .download(&slot.storage_key, temp.as_file(), self.quiet)
            .await?;

        if self.verify {
            let bytes = tokio::fs::read(temp.path()).await?;
            let actual = crc64_iso_hex16(&bytes);
            if actual != slot.hash {
                return Err(ZstoreError::IntegrityFailed {
                    expected: slot.hash.clone(),
                    actual,
                });
            }
        }

        temp.into_temp_path()
            .keep()
            .map_err(|e| ZstoreError::Io(e.error))
    }
}

/// Index-ordered temp shard paths; removes every file on drop so no exit
/// path can leak scratch space.
struct TempShards {
    paths: Vec<Option<PathBuf>>,
}

impl TempShards {
    fn paths(&self) -> &[Option<PathBuf>] {
        &self.paths
    }
}

impl Drop for TempShards {
    fn drop(&mut self) {
        for path in self.paths.iter().flatten() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to remove temp shard file");
            }
        }
    }
}
