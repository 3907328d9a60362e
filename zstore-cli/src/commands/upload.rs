//! Upload command
//!
//! Erasure-codes a local file and scatters its shards across the
//! configured buckets.

use crate::url::parse_zs_url;
use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::{Path, PathBuf};
use zstore_core::{DEFAULT_CONCURRENCY, DEFAULT_DATA_SHARDS, DEFAULT_PARITY_SHARDS};
use zstore_engine::{ObjectEngine, UploadOptions};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    pub file_path: PathBuf,

    /// Destination address (zs://prefix/object). Defaults to the source
    /// file name; a trailing slash appends the file name.
    pub dest: Option<String>,

    /// Suppress progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of data shards for erasure coding
    #[arg(long, default_value_t = DEFAULT_DATA_SHARDS)]
    pub data_shards: usize,

    /// Number of parity shards for erasure coding
    #[arg(long, default_value_t = DEFAULT_PARITY_SHARDS)]
    pub parity_shards: usize,

    /// Number of concurrent shard uploads
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

pub async fn run(engine: &ObjectEngine, args: UploadArgs) -> Result<()> {
    let file_name = file_name_of(&args.file_path)?;
    let key = match &args.dest {
        Some(dest) => {
            let key = parse_zs_url(dest)?;
            if key.is_empty() || key.ends_with('/') {
                format!("{}{}", key, file_name)
            } else {
                key
            }
        }
        None => file_name.to_string(),
    };

    let file = tokio::fs::File::open(&args.file_path)
        .await
        .with_context(|| format!("failed to open {}", args.file_path.display()))?;

    engine
        .upload(
            &key,
            file,
            UploadOptions {
                quiet: args.quiet,
                data_shards: args.data_shards,
                parity_shards: args.parity_shards,
                concurrency: args.concurrency,
            },
        )
        .await?;

    println!(
        "{} {} -> zs://{}",
        style("Uploaded").green().bold(),
        args.file_path.display(),
        key
    );
    Ok(())
}

fn file_name_of(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .context("source path has no file name")
}
