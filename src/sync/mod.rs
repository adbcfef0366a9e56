use chrono::Utc;
use tracing::{debug, info, warn};

pub mod batch;
pub mod pass;

pub use batch::{group_scores_by_gameweek, refresh_batch, refresh_scores, Batch};
pub use pass::{sync_from_source, watch, BatchFailure, PassSummary};

use crate::entities::SyncEntity;
use crate::error::{RefreshError, StoreError};
use crate::store::{BucketMut, BucketStore, StoreOptions, WriteTx};

/// Where in the per-record pipeline a record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    /// Record belongs to a different bucket than the one being refreshed
    Bucket,
    Key,
    Read,
    Freshness,
    Encode,
    Write,
}

/// A record that was left out of a pass, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position of the record in the input batch
    pub index: usize,
    /// Derived key, when derivation got that far
    pub key: Option<String>,
    pub stage: SkipStage,
    pub reason: String,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub bucket: String,
    /// Records written because they were new or changed
    pub written: usize,
    /// Records already represented in the store
    pub fresh: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl RefreshReport {
    fn new(bucket: &str) -> Self {
        RefreshReport {
            bucket: bucket.to_string(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.fresh + self.skipped.len()
    }
}

enum RecordOutcome {
    Written,
    Fresh,
    Skipped(SkippedRecord),
}

/// Merge `records` into `bucket`, writing only records that are new or changed.
///
/// An empty batch returns immediately without opening the store. Per-record
/// failures are logged and reported, never returned; the only errors are
/// store-level ones (lock timeout, open, bucket creation, commit), in which
/// case nothing from this batch was applied.
pub fn refresh<E: SyncEntity>(
    options: &StoreOptions,
    bucket: &str,
    records: &[E],
) -> Result<RefreshReport, RefreshError> {
    if records.is_empty() {
        return Ok(RefreshReport::new(bucket));
    }

    let mut store = BucketStore::open(options)?;
    let report = store.update(|tx| apply_records(tx, bucket, records))?;
    // Already committed; a close fault only affects the handle.
    if let Err(e) = store.close() {
        warn!("Failed to close store after refreshing {:?}: {}", bucket, e);
    }

    info!(
        "Refreshed {} bucket {:?}: {} written, {} fresh, {} skipped",
        E::KIND,
        bucket,
        report.written,
        report.fresh,
        report.skipped.len()
    );
    Ok(report)
}

fn apply_records<E: SyncEntity>(
    tx: &WriteTx<'_>,
    bucket_name: &str,
    records: &[E],
) -> Result<RefreshReport, StoreError> {
    let bucket = tx.create_bucket_if_not_exists(bucket_name)?;
    let mut report = RefreshReport::new(bucket_name);

    for (index, record) in records.iter().enumerate() {
        match refresh_record(&bucket, index, record) {
            RecordOutcome::Written => report.written += 1,
            RecordOutcome::Fresh => report.fresh += 1,
            RecordOutcome::Skipped(skip) => {
                warn!(
                    "Skipping {} #{} in bucket {:?} at {:?} stage (key={:?}): {}",
                    E::KIND,
                    skip.index,
                    bucket_name,
                    skip.stage,
                    skip.key,
                    skip.reason
                );
                report.skipped.push(skip);
            }
        }
    }
    Ok(report)
}

fn refresh_record<E: SyncEntity>(bucket: &BucketMut<'_>, index: usize, record: &E) -> RecordOutcome {
    let skip = |key: Option<&[u8]>, stage: SkipStage, reason: String| {
        RecordOutcome::Skipped(SkippedRecord {
            index,
            key: key.map(|k| String::from_utf8_lossy(k).into_owned()),
            stage,
            reason,
        })
    };

    if let Some(home) = record.home_bucket() {
        if home != bucket.name() {
            return skip(
                None,
                SkipStage::Bucket,
                format!("record belongs in bucket {:?}", home),
            );
        }
    }

    let key = match record.key() {
        Ok(k) => k,
        Err(e) => return skip(None, SkipStage::Key, e.to_string()),
    };

    let existing = match bucket.get(&key) {
        Ok(v) => v,
        Err(e) => return skip(Some(key.as_slice()), SkipStage::Read, e.to_string()),
    };

    match record.is_fresh(existing.as_deref()) {
        Ok(true) => {
            debug!("{} {:?} is fresh", E::KIND, String::from_utf8_lossy(&key));
            return RecordOutcome::Fresh;
        }
        Ok(false) => {}
        Err(e) => return skip(Some(key.as_slice()), SkipStage::Freshness, e.to_string()),
    }

    let payload = match record.encode(Utc::now()) {
        Ok(p) => p,
        Err(e) => return skip(Some(key.as_slice()), SkipStage::Encode, e.to_string()),
    };

    match bucket.put(&key, &payload) {
        Ok(()) => {
            debug!("{} {:?} written", E::KIND, String::from_utf8_lossy(&key));
            RecordOutcome::Written
        }
        Err(e) => skip(Some(key.as_slice()), SkipStage::Write, e.to_string()),
    }
}
