//! List command

use crate::url::parse_zs_url;
use anyhow::Result;
use clap::Args;
use console::style;
use zstore_engine::ObjectEngine;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Prefix address (zs://prefix)
    pub prefix: String,
}

pub async fn run(engine: &ObjectEngine, args: ListArgs) -> Result<()> {
    let prefix = parse_zs_url(&args.prefix)?;
    let prefix = prefix.trim_end_matches('/');

    let manifests = engine.list(prefix).await?;
    if manifests.is_empty() {
        println!("No objects found under zs://{}", prefix);
        return Ok(());
    }

    println!("{} zs://{}:", style("Objects in").bold(), prefix);
    for manifest in manifests {
        println!(
            "  {}  ({} bytes, {}+{} shards)",
            manifest.object_key(),
            manifest.original_size,
            manifest.data_shards(),
            manifest.parity_shards,
        );
    }
    Ok(())
}
