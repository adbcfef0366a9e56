use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};

use fpl_store_sync::config::{Command, Config};
use fpl_store_sync::error::StoreError;
use fpl_store_sync::sources::JsonFileSource;
use fpl_store_sync::store::{BucketStore, StoreOptions};
use fpl_store_sync::sync::{sync_from_source, watch};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let options = config.store_options();

    match config.command {
        Command::Sync { input } => {
            let source = JsonFileSource::new(&input);
            let summary = sync_from_source(&source, &options).await?;
            if !summary.failures.is_empty() {
                anyhow::bail!(
                    "{} batch(es) were not applied to {}",
                    summary.failures.len(),
                    options.path.display()
                );
            }
        }
        Command::Watch {
            input,
            poll_interval_secs,
        } => {
            let source = JsonFileSource::new(&input);
            watch(&source, &options, Duration::from_secs(poll_interval_secs)).await?;
        }
        Command::Inspect { bucket } => {
            let entries = tokio::task::spawn_blocking(move || read_bucket(&options, &bucket))
                .await
                .context("Inspect task panicked")??;
            for (key, value) in entries {
                println!(
                    "{}\t{}",
                    String::from_utf8_lossy(&key),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Command::Buckets => {
            let names = tokio::task::spawn_blocking(move || list_buckets(&options))
                .await
                .context("Buckets task panicked")??;
            info!("{} bucket(s)", names.len());
            for name in names {
                println!("{}", name);
            }
        }
    }

    Ok(())
}

fn read_bucket(options: &StoreOptions, bucket: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut store = BucketStore::open_existing(options)
        .with_context(|| format!("Failed to open {}", options.path.display()))?;
    let entries = store.view(|tx| match tx.bucket(bucket)? {
        Some(b) => b.entries(),
        None => {
            warn!("Bucket {:?} does not exist", bucket);
            Ok::<_, StoreError>(Vec::new())
        }
    })?;
    store.close()?;
    Ok(entries)
}

fn list_buckets(options: &StoreOptions) -> Result<Vec<String>> {
    let mut store = BucketStore::open_existing(options)
        .with_context(|| format!("Failed to open {}", options.path.display()))?;
    let names = store.view(|tx| tx.bucket_names())?;
    store.close()?;
    Ok(names)
}
