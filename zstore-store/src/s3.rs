//! S3-compatible backend driver
//!
//! Uploads use a single PutObject with an explicit content length for small
//! payloads and switch to the multipart path above the part threshold.
//! Downloads are range-aware: when the content length is known and large,
//! the object is fetched as concurrent byte-range GETs written into the
//! sink at their offsets.

use crate::driver::{BackendKind, ObjectStore};
use crate::progress::transfer_bar;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use indicatif::ProgressBar;
use tracing::debug;
use zstore_core::error::{Result, ZstoreError};
use zstore_core::sink::WriteAt;

/// Part size for multipart uploads (8 MiB; S3 minimum is 5 MiB).
const UPLOAD_PART_SIZE: usize = 8 * 1024 * 1024;

/// Payloads at or below this go through a single PutObject with an
/// explicit content length.
const MULTIPART_THRESHOLD: usize = UPLOAD_PART_SIZE;

/// Part size for ranged downloads (8 MiB).
const DOWNLOAD_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Maximum concurrent byte-range GETs per object download.
const DOWNLOAD_CONCURRENCY: usize = 4;

fn backend_err(e: impl std::fmt::Display) -> ZstoreError {
    ZstoreError::Backend(e.to_string())
}

/// Split a payload of `len` bytes into `(start, end)` slice bounds of at
/// most `part_size` bytes, in order.
fn plan_parts(len: usize, part_size: usize) -> Vec<(usize, usize)> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    while start < len {
        let end = (start + part_size).min(len);
        parts.push((start, end));
        start = end;
    }
    parts
}

/// Split an object of `size` bytes into inclusive byte ranges of at most
/// `part_size` bytes, as used in HTTP Range headers.
fn plan_ranges(size: u64, part_size: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    let mut start = 0u64;
    while start < size {
        let end = (start + part_size).min(size) - 1;
        ranges.push((start, end));
        start += part_size;
    }
    ranges
}

/// Driver for one bucket on an S3-compatible store.
pub struct S3ObjectStore {
    client: Client,
    bucket_name: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket_name: impl Into<String>) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
        }
    }

    async fn upload_multipart(
        &self,
        key: &str,
        data: Bytes,
        bar: Option<&ProgressBar>,
    ) -> Result<()> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| ZstoreError::UploadFailed(e.to_string()))?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| {
                ZstoreError::UploadFailed("no upload_id in create_multipart_upload response".into())
            })?
            .to_string();

        match self.upload_parts(key, &upload_id, data, bar).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket_name)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await;
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: Bytes,
        bar: Option<&ProgressBar>,
    ) -> Result<()> {
        let mut parts = Vec::new();
        for (index, (start, end)) in plan_parts(data.len(), UPLOAD_PART_SIZE).into_iter().enumerate() {
            let part_number = index as i32 + 1;
            let part = data.slice(start..end);
            let part_len = part.len() as u64;

            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket_name)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|e| ZstoreError::UploadFailed(e.to_string()))?;
            parts.push(
                CompletedPart::builder()
                    .e_tag(resp.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            if let Some(bar) = bar {
                bar.inc(part_len);
            }
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket_name)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| ZstoreError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn download_ranged(
        &self,
        key: &str,
        size: u64,
        sink: &dyn WriteAt,
        bar: Option<&ProgressBar>,
    ) -> Result<u64> {
        let ranges = plan_ranges(size, DOWNLOAD_PART_SIZE);
        let mut fetches = futures::stream::iter(ranges.into_iter().map(|(start, end)| {
            let client = self.client.clone();
            let bucket = self.bucket_name.clone();
            let key = key.to_string();
            async move {
                let resp = client
                    .get_object()
                    .bucket(&bucket)
                    .key(&key)
                    .range(format!("bytes={}-{}", start, end))
                    .send()
                    .await
                    .map_err(backend_err)?;
                let body = resp.body.collect().await.map_err(backend_err)?.into_bytes();
                Ok::<(u64, Bytes), ZstoreError>((start, body))
            }
        }))
        .buffer_unordered(DOWNLOAD_CONCURRENCY);

        let mut written = 0u64;
        while let Some(part) = fetches.next().await {
            let (offset, body) = part?;
            sink.write_at(&body, offset)?;
            written += body.len() as u64;
            if let Some(bar) = bar {
                bar.inc(body.len() as u64);
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, key: &str, data: Bytes, quiet: bool) -> Result<String> {
        let len = data.len() as u64;
        let bar = (!quiet).then(|| transfer_bar(Some(len), "uploading"));

        if data.len() > MULTIPART_THRESHOLD {
            self.upload_multipart(key, data, bar.as_ref()).await?;
        } else {
            self.client
                .put_object()
                .bucket(&self.bucket_name)
                .key(key)
                .content_length(data.len() as i64)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| ZstoreError::UploadFailed(e.to_string()))?;
            if let Some(bar) = &bar {
                bar.inc(len);
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        debug!(bucket = %self.bucket_name, key, "uploaded object");
        Ok(format!("{}/{}", self.bucket_name, key))
    }

    async fn download(&self, key: &str, sink: &dyn WriteAt, quiet: bool) -> Result<u64> {
        // HEAD for the content length; skippable when quiet.
        let content_length = if quiet {
            None
        } else {
            self.client
                .head_object()
                .bucket(&self.bucket_name)
                .key(key)
                .send()
                .await
                .ok()
                .and_then(|head| head.content_length())
                .map(|len| len as u64)
        };

        let bar = content_length.map(|len| transfer_bar(Some(len), "downloading"));

        let written = match content_length {
            Some(size) if size > DOWNLOAD_PART_SIZE => {
                self.download_ranged(key, size, sink, bar.as_ref()).await?
            }
            _ => {
                let resp = self
                    .client
                    .get_object()
                    .bucket(&self.bucket_name)
                    .key(key)
                    .send()
                    .await
                    .map_err(backend_err)?;
                let body = resp.body.collect().await.map_err(backend_err)?.into_bytes();
                sink.write_at(&body, 0)?;
                if let Some(bar) = &bar {
                    bar.inc(body.len() as u64);
                }
                body.len() as u64
            }
        };

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        debug!(bucket = %self.bucket_name, key, written, "downloaded object");
        Ok(written)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let mut continuation: Option<String> = None;
        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix);
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }
            let resp = req.send().await.map_err(backend_err)?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    self.delete(key).await?;
                }
            }

            if resp.is_truncated() == Some(true) {
                continuation = resp.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::S3
    }

    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parts_exact_multiple() {
        assert_eq!(plan_parts(8, 4), vec![(0, 4), (4, 8)]);
    }

    #[test]
    fn test_plan_parts_with_remainder() {
        assert_eq!(plan_parts(10, 4), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(plan_parts(3, 4), vec![(0, 3)]);
    }

    #[test]
    fn test_plan_parts_straddling_part_size() {
        assert_eq!(
            plan_parts(UPLOAD_PART_SIZE, UPLOAD_PART_SIZE),
            vec![(0, UPLOAD_PART_SIZE)]
        );
        assert_eq!(
            plan_parts(UPLOAD_PART_SIZE + 1, UPLOAD_PART_SIZE),
            vec![(0, UPLOAD_PART_SIZE), (UPLOAD_PART_SIZE, UPLOAD_PART_SIZE + 1)]
        );
    }

    #[test]
    fn test_plan_ranges_inclusive_bounds() {
        assert_eq!(plan_ranges(10, 4), vec![(0, 3), (4, 7), (8, 9)]);
        assert_eq!(plan_ranges(1, 4), vec![(0, 0)]);
        assert_eq!(plan_ranges(4, 4), vec![(0, 3)]);
    }

    #[test]
    fn test_plan_ranges_straddling_part_size() {
        assert_eq!(
            plan_ranges(DOWNLOAD_PART_SIZE, DOWNLOAD_PART_SIZE),
            vec![(0, DOWNLOAD_PART_SIZE - 1)]
        );
        assert_eq!(
            plan_ranges(DOWNLOAD_PART_SIZE + 1, DOWNLOAD_PART_SIZE),
            vec![
                (0, DOWNLOAD_PART_SIZE - 1),
                (DOWNLOAD_PART_SIZE, DOWNLOAD_PART_SIZE)
            ]
        );
        assert_eq!(
            plan_ranges(3 * DOWNLOAD_PART_SIZE - 1, DOWNLOAD_PART_SIZE),
            vec![
                (0, DOWNLOAD_PART_SIZE - 1),
                (DOWNLOAD_PART_SIZE, 2 * DOWNLOAD_PART_SIZE - 1),
                (2 * DOWNLOAD_PART_SIZE, 3 * DOWNLOAD_PART_SIZE - 2)
            ]
        );
    }

    #[test]
    fn test_ranges_cover_object_contiguously() {
        for size in [1u64, 100, DOWNLOAD_PART_SIZE * 2 + 17] {
            let ranges = plan_ranges(size, DOWNLOAD_PART_SIZE);
            assert_eq!(ranges[0].0, 0);
            assert_eq!(ranges[ranges.len() - 1].1, size - 1);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].1 + 1, pair[1].0);
            }
        }
    }
}
