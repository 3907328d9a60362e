//! Administrative commands: manifest table lifecycle and config debugging.

use crate::config::ZstoreConfig;
use anyhow::Result;
use console::style;
use zstore_metadata::DynamoMetadataStore;

/// Create the manifest table if it does not exist.
pub async fn init(metadata: &DynamoMetadataStore) -> Result<()> {
    metadata.ensure_table().await?;
    println!(
        "{} manifest table {}",
        style("Initialized").green().bold(),
        metadata.table_name()
    );
    Ok(())
}

/// Drop the manifest table.
pub async fn down(metadata: &DynamoMetadataStore) -> Result<()> {
    metadata.drop_table().await?;
    println!(
        "{} manifest table {}",
        style("Dropped").green().bold(),
        metadata.table_name()
    );
    Ok(())
}

/// Print the resolved configuration.
pub fn debug(config: &ZstoreConfig) {
    println!("Configuration:");
    println!("  Log level:      {}", config.log_level);
    println!("  DynamoDB table: {}", config.dynamodb_table);
    if let Some(region) = &config.aws_region {
        println!("  AWS region:     {}", region);
    }

    println!("\nBuckets:");
    if config.buckets.is_empty() {
        println!("  (none configured)");
    }
    for (name, bucket) in &config.buckets {
        println!("  {}:", name);
        println!("    Name:     {}", bucket.bucket_name);
        println!("    Platform: {}", bucket.platform);
        if let Some(region) = &bucket.region {
            println!("    Region:   {}", region);
        }
    }
}
