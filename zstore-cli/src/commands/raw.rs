//! Raw passthrough commands
//!
//! Direct single-bucket transfers without erasure coding, addressed with
//! `s3://bucket/key` or `gs://bucket/key`.

use crate::config::ZstoreConfig;
use crate::url::{parse_gs_url, parse_s3_url};
use anyhow::{bail, Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;
use zstore_engine::RawObjectService;
use zstore_store::{BackendKind, BucketDescriptor};

#[derive(Args, Debug)]
pub struct UploadRawArgs {
    /// Local file to upload
    pub file_path: PathBuf,

    /// Destination (s3://bucket/key or gs://bucket/key)
    pub dest: String,

    /// Suppress progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct DownloadRawArgs {
    /// Source (s3://bucket/key or gs://bucket/key)
    pub source: String,

    /// Output file, or a directory to place the file in
    pub output: PathBuf,

    /// Suppress progress bars
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct DeleteRawArgs {
    /// Target (s3://bucket/key or gs://bucket/key)
    pub target: String,
}

/// Resolve a raw URL to a bucket descriptor plus object key. S3 buckets
/// need a region: a configured bucket entry with a matching physical name
/// wins, the global `aws_region` is the fallback.
fn resolve(url: &str, config: &ZstoreConfig) -> Result<(BucketDescriptor, String)> {
    if url.starts_with("s3://") {
        let (bucket, key) = parse_s3_url(url)?;
        let region = config.region_for_bucket(&bucket).with_context(|| {
            format!(
                "no region known for s3 bucket {}; set aws_region or a bucket entry in the config",
                bucket
            )
        })?;
        Ok((
            BucketDescriptor::new(bucket, BackendKind::S3, Some(region)),
            key,
        ))
    } else if url.starts_with("gs://") {
        let (bucket, key) = parse_gs_url(url)?;
        Ok((BucketDescriptor::new(bucket, BackendKind::Gcs, None), key))
    } else {
        bail!("URL must start with s3:// or gs://")
    }
}

pub async fn upload(
    raw: &RawObjectService,
    config: &ZstoreConfig,
    args: UploadRawArgs,
) -> Result<()> {
    let (descriptor, mut key) = resolve(&args.dest, config)?;

    let file_name = args
        .file_path
        .file_name()
        .and_then(|n| n.to_str())
        .context("source path has no file name")?;
    if key.is_empty() || key.ends_with('/') {
        key.push_str(file_name);
    }

    let file = tokio::fs::File::open(&args.file_path)
        .await
        .with_context(|| format!("failed to open {}", args.file_path.display()))?;

    let location = raw.upload(&descriptor, &key, file, args.quiet).await?;
    println!(
        "{} {} -> {}",
        style("Uploaded").green().bold(),
        args.file_path.display(),
        location
    );
    Ok(())
}

pub async fn download(
    raw: &RawObjectService,
    config: &ZstoreConfig,
    args: DownloadRawArgs,
) -> Result<()> {
    let (descriptor, key) = resolve(&args.source, config)?;

    let mut output = args.output.clone();
    if output.is_dir() {
        let file_name = key.rsplit('/').next().unwrap_or(&key);
        output.push(file_name);
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let file = std::fs::File::create(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let written = raw.download(&descriptor, &key, &file, args.quiet).await?;
    println!(
        "{} {} -> {} ({} bytes)",
        style("Downloaded").green().bold(),
        args.source,
        output.display(),
        written
    );
    Ok(())
}

pub async fn delete(
    raw: &RawObjectService,
    config: &ZstoreConfig,
    args: DeleteRawArgs,
) -> Result<()> {
    let (descriptor, key) = resolve(&args.target, config)?;
    raw.delete(&descriptor, &key).await?;

    println!("{} {}", style("Deleted").green().bold(), args.target);
    Ok(())
}
