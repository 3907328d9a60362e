//! Google Cloud Storage backend driver
//!
//! Uses the bucket/object API directly. Downloads read the object
//! sequentially, then write the whole buffer at offset 0 into the sink —
//! peak memory is the full object size.

use crate::driver::{BackendKind, ObjectStore};
use crate::progress::transfer_bar;
use async_trait::async_trait;
use bytes::Bytes;
use google_cloud_storage::client::Client;
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use tracing::{debug, warn};
use zstore_core::error::{Result, ZstoreError};
use zstore_core::sink::WriteAt;

fn backend_err(e: impl std::fmt::Display) -> ZstoreError {
    ZstoreError::Backend(e.to_string())
}

/// GCS reports a delete of a missing object as an error; the driver
/// contract treats that as success.
fn is_not_found(e: &GcsError) -> bool {
    match e {
        GcsError::Response(resp) => resp.code == 404,
        GcsError::HttpClient(e) => e.status().map(|s| s.as_u16() == 404).unwrap_or(false),
        _ => false,
    }
}

/// Driver for one bucket on Google Cloud Storage.
pub struct GcsObjectStore {
    client: Client,
    bucket_name: String,
}

impl GcsObjectStore {
    pub fn new(client: Client, bucket_name: impl Into<String>) -> Self {
        Self {
            client,
            bucket_name: bucket_name.into(),
        }
    }

    fn get_request(&self, key: &str) -> GetObjectRequest {
        GetObjectRequest {
            bucket: self.bucket_name.clone(),
            object: key.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn upload(&self, key: &str, data: Bytes, quiet: bool) -> Result<String> {
        let len = data.len() as u64;
        let bar = (!quiet).then(|| transfer_bar(Some(len), "uploading"));

        let upload_type = UploadType::Simple(Media::new(key.to_string()));
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket_name.clone(),
                    ..Default::default()
                },
                data,
                &upload_type,
            )
            .await
            .map_err(|e| ZstoreError::UploadFailed(e.to_string()))?;

        if let Some(bar) = bar {
            bar.inc(len);
            bar.finish_and_clear();
        }
        debug!(bucket = %self.bucket_name, key, "uploaded object to gcs");
        Ok(format!("{}/{}", self.bucket_name, key))
    }

    async fn download(&self, key: &str, sink: &dyn WriteAt, quiet: bool) -> Result<u64> {
        // Object metadata first for the progress bar; skippable when quiet.
        let size = if quiet {
            None
        } else {
            self.client
                .get_object(&self.get_request(key))
                .await
                .ok()
                .map(|object| object.size as u64)
        };
        let bar = size.map(|len| transfer_bar(Some(len), "downloading"));

        // Sequential read of the whole object, then one positional write.
        let data = self
            .client
            .download_object(&self.get_request(key), &Range::default())
            .await
            .map_err(backend_err)?;
        sink.write_at(&data, 0)?;

        if let Some(bar) = bar {
            bar.inc(data.len() as u64);
            bar.finish_and_clear();
        }
        debug!(bucket = %self.bucket_name, key, written = data.len(), "downloaded object from gcs");
        Ok(data.len() as u64)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let result = self
            .client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket_name.clone(),
                object: key.to_string(),
                ..Default::default()
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!(bucket = %self.bucket_name, key, "delete of missing object ignored");
                Ok(())
            }
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let mut page_token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects(&ListObjectsRequest {
                    bucket: self.bucket_name.clone(),
                    prefix: Some(prefix.to_string()),
                    page_token: page_token.clone(),
                    ..Default::default()
                })
                .await
                .map_err(backend_err)?;

            for object in resp.items.unwrap_or_default() {
                let delete = self
                    .client
                    .delete_object(&DeleteObjectRequest {
                        bucket: self.bucket_name.clone(),
                        object: object.name.clone(),
                        ..Default::default()
                    })
                    .await;
                if let Err(e) = delete {
                    warn!(object = %object.name, error = %e, "failed to delete object under prefix");
                }
            }

            match resp.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Gcs
    }

    fn bucket_name(&self) -> &str {
        &self.bucket_name
    }
}
