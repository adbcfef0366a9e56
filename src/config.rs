use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::StoreOptions;

/// Differential sync of fantasy football records into a bucketed store
#[derive(Parser, Debug, Clone)]
#[command(name = "fpl-store-sync", version, about)]
pub struct Config {
    /// SQLite store path
    #[arg(long, env = "DATABASE_PATH", default_value = "fpl.db", global = true)]
    pub database_path: String,

    /// Maximum time to wait for the store's writer lock, in milliseconds
    #[arg(long, env = "LOCK_TIMEOUT_MS", default_value = "1000", global = true)]
    pub lock_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sync teams, players and scores from a snapshot file once
    Sync {
        /// JSON snapshot produced by the fetcher
        #[arg(long, env = "SNAPSHOT_PATH")]
        input: PathBuf,
    },

    /// Re-sync from a snapshot file on an interval until interrupted
    Watch {
        /// JSON snapshot produced by the fetcher
        #[arg(long, env = "SNAPSHOT_PATH")]
        input: PathBuf,

        /// Sync interval in seconds
        #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "60")]
        poll_interval_secs: u64,
    },

    /// Print every key and payload of one bucket
    Inspect {
        /// Bucket name, e.g. "teams", "players" or a gameweek number
        #[arg(long)]
        bucket: String,
    },

    /// List bucket names
    Buckets,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_path.trim().is_empty() {
            anyhow::bail!("database_path must not be empty");
        }
        if self.lock_timeout_ms == 0 {
            anyhow::bail!("lock_timeout_ms must be positive");
        }
        if let Command::Watch {
            poll_interval_secs, ..
        } = &self.command
        {
            if *poll_interval_secs == 0 {
                anyhow::bail!("poll_interval_secs must be positive");
            }
        }
        if let Command::Inspect { bucket } = &self.command {
            if bucket.trim().is_empty() {
                anyhow::bail!("bucket must not be empty");
            }
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions::new(&self.database_path)
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }
}
