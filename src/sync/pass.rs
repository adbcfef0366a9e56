use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use super::{refresh_batch, RefreshReport};
use crate::sources::RecordSource;
use crate::store::StoreOptions;

/// A batch whose refresh failed at the store level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub bucket: String,
    pub error: String,
    pub lock_timeout: bool,
}

/// Result of syncing one source snapshot.
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub reports: Vec<RefreshReport>,
    pub failures: Vec<BatchFailure>,
}

impl PassSummary {
    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written).sum()
    }

    pub fn fresh(&self) -> usize {
        self.reports.iter().map(|r| r.fresh).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|r| r.skipped.len()).sum()
    }
}

/// Fetch a snapshot from `source` and refresh every non-empty batch in it.
///
/// Batches run one after another on the blocking pool. A store-level
/// failure of one batch is recorded and the remaining batches still run.
pub async fn sync_from_source(source: &dyn RecordSource, options: &StoreOptions) -> Result<PassSummary> {
    let snapshot = source
        .fetch_snapshot()
        .await
        .with_context(|| format!("Source '{}' failed", source.name()))?;

    let mut summary = PassSummary::default();
    for batch in snapshot.into_batches() {
        if batch.is_empty() {
            continue;
        }
        let bucket = batch.bucket_name();
        let kind = batch.kind();
        let opts = options.clone();
        let result = tokio::task::spawn_blocking(move || refresh_batch(&opts, &batch))
            .await
            .context("Refresh task panicked")?;

        match result {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                error!("Failed to refresh {} bucket {:?}: {}", kind, bucket, e);
                summary.failures.push(BatchFailure {
                    bucket,
                    error: e.to_string(),
                    lock_timeout: e.is_lock_timeout(),
                });
            }
        }
    }

    info!(
        "Sync from '{}' complete: {} written, {} fresh, {} skipped, {} failed batch(es)",
        source.name(),
        summary.written(),
        summary.fresh(),
        summary.skipped(),
        summary.failures.len()
    );
    Ok(summary)
}

/// Re-sync from `source` every `poll_interval` until Ctrl-C.
pub async fn watch(source: &dyn RecordSource, options: &StoreOptions, poll_interval: Duration) -> Result<()> {
    info!(
        "Watching '{}' (interval={:?}, store={})",
        source.name(),
        poll_interval,
        options.path.display()
    );
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sync_from_source(source, options).await {
                    Ok(summary) if !summary.failures.is_empty() => {
                        warn!("{} batch(es) not applied this pass", summary.failures.len());
                    }
                    Ok(_) => {}
                    Err(e) => error!("Sync pass failed: {:#}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down watcher");
                return Ok(());
            }
        }
    }
}
