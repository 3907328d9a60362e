//! Delete command

use crate::url::parse_zs_url;
use anyhow::Result;
use clap::Args;
use console::style;
use zstore_engine::ObjectEngine;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Object address (zs://prefix/object)
    pub target: String,
}

pub async fn run(engine: &ObjectEngine, args: DeleteArgs) -> Result<()> {
    let key = parse_zs_url(&args.target)?;
    engine.delete(&key).await?;

    println!("{} zs://{}", style("Deleted").green().bold(), key);
    Ok(())
}
