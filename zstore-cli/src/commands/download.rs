//! Download command
//!
//! Reconstructs an erasure-coded object and writes it to a local file.

use crate::url::parse_zs_url;
use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;
use zstore_core::DEFAULT_CONCURRENCY;
use zstore_engine::ObjectEngine;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Source address (zs://prefix/object)
    pub source: String,

    /// Output file, or a directory to place the file in
    pub output: PathBuf,

    /// Suppress progress bars
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of concurrent shard downloads
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Verify the CRC64 fingerprint of every fetched shard
    #[arg(long)]
    pub verify: bool,
}

pub async fn run(engine: &mut ObjectEngine, args: DownloadArgs) -> Result<()> {
    let key = parse_zs_url(&args.source)?;
    engine.set_concurrency(args.concurrency);
    engine.set_verify_integrity(args.verify);

    // A directory target gets the object's file name appended.
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

    engine.download(&key, &file, args.quiet).await?;

    println!(
        "{} zs://{} -> {}",
        style("Downloaded").green().bold(),
        key,
        output.display()
    );
    Ok(())
}
