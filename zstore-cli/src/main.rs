//! Zstore CLI
//!
//! Erasure-coded object storage across heterogeneous cloud buckets:
//! payloads are RS(k, m)-coded, shards scatter round-robin over the
//! configured S3/GCS buckets, and a DynamoDB manifest records where every
//! shard lives.

mod commands;
mod config;
mod url;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::ZstoreConfig;
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use zstore_engine::{ObjectEngine, Placer, RawObjectService, RoundRobinPlacer};
use zstore_metadata::DynamoMetadataStore;
use zstore_store::StoreFactory;

#[derive(Parser)]
#[command(
    name = "zstore",
    version,
    about = "Erasure-coded object storage across heterogeneous cloud buckets"
)]
struct Cli {
    /// Config file path (default: ./zstore.toml, then ~/.zstore/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// DynamoDB table holding object manifests
    #[arg(long, global = true)]
    dynamodb_table: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file with erasure coding
    Upload(commands::upload::UploadArgs),
    /// Download a file with erasure-coded reconstruction
    Download(commands::download::DownloadArgs),
    /// Delete an object and all of its shards
    Delete(commands::delete::DeleteArgs),
    /// List objects stored under a prefix
    List(commands::list::ListArgs),
    /// Upload a file directly, without erasure coding
    UploadRaw(commands::raw::UploadRawArgs),
    /// Download an object directly, without erasure coding
    DownloadRaw(commands::raw::DownloadRawArgs),
    /// Delete an object directly, without erasure coding
    DeleteRaw(commands::raw::DeleteRawArgs),
    /// Create the manifest table
    Init,
    /// Drop the manifest table
    Down,
    /// Show the resolved configuration
    Debug,
}

/// Everything a command needs, wired once at startup.
struct App {
    config: ZstoreConfig,
    engine: ObjectEngine,
    raw: RawObjectService,
    metadata: Arc<DynamoMetadataStore>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ZstoreConfig::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(table) = &cli.dynamodb_table {
        config.dynamodb_table = table.clone();
    }
    init_logging(&config.log_level);

    // The debug command only inspects config; skip client construction.
    if matches!(cli.command, Command::Debug) {
        commands::admin::debug(&config);
        return Ok(());
    }

    let mut app = build_app(config).await?;

    match cli.command {
        Command::Upload(args) => commands::upload::run(&app.engine, args).await,
        Command::Download(args) => commands::download::run(&mut app.engine, args).await,
        Command::Delete(args) => commands::delete::run(&app.engine, args).await,
        Command::List(args) => commands::list::run(&app.engine, args).await,
        Command::UploadRaw(args) => commands::raw::upload(&app.raw, &app.config, args).await,
        Command::DownloadRaw(args) => commands::raw::download(&app.raw, &app.config, args).await,
        Command::DeleteRaw(args) => commands::raw::delete(&app.raw, &app.config, args).await,
        Command::Init => commands::admin::init(&app.metadata).await,
        Command::Down => commands::admin::down(&app.metadata).await,
        Command::Debug => unreachable!("handled before app construction"),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the engine and services from configuration: cloud clients, the
/// backend factory, the placer with every configured bucket registered
/// (in sorted key order, so placement stays deterministic across runs),
/// and the manifest store.
async fn build_app(config: ZstoreConfig) -> Result<App> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &config.aws_region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    let aws_config = loader.load().await;

    // The GCS client is only built when a gcs bucket is configured.
    let gcs_client = if config.has_gcs_bucket() {
        match google_cloud_storage::client::ClientConfig::default()
            .with_auth()
            .await
        {
            Ok(client_config) => Some(google_cloud_storage::client::Client::new(client_config)),
            Err(e) => {
                warn!(error = %e, "failed to initialize gcs client; gcs buckets will be unavailable");
                None
            }
        }
    } else {
        None
    };

    let factory = Arc::new(StoreFactory::new(aws_config.clone(), gcs_client));

    let placer = Arc::new(RoundRobinPlacer::new());
    for (name, bucket) in &config.buckets {
        let descriptor = match bucket.to_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(bucket = %name, error = %e, "skipping misconfigured bucket");
                continue;
            }
        };
        match factory.build(&descriptor) {
            Ok(driver) => placer.register_bucket(name, driver)?,
            Err(e) => warn!(bucket = %name, error = %e, "failed to create driver for bucket"),
        }
    }

    let dynamo_client = aws_sdk_dynamodb::Client::new(&aws_config);
    let metadata = Arc::new(DynamoMetadataStore::new(
        dynamo_client,
        config.dynamodb_table.clone(),
    ));

    let engine = ObjectEngine::new(placer, metadata.clone());
    let raw = RawObjectService::new(factory);

    Ok(App {
        config,
        engine,
        raw,
        metadata,
    })
}
