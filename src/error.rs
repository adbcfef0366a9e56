use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by the bucket store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer held the store lease for longer than the configured timeout.
    #[error("timed out after {waited:?} waiting for the writer lock on {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("store not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("invalid bucket name: {0:?}")]
    InvalidBucketName(String),

    #[error("empty key rejected by bucket {0:?}")]
    EmptyKey(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures deriving a key, building a payload, or reading one back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{entity} is missing key field `{field}`")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} has invalid field `{field}`: {reason}")]
    InvalidField {
        entity: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// The only failures that abort a whole refresh pass.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("gameweek must be at least 1, got {0}")]
    InvalidGameweek(u32),
}

impl RefreshError {
    /// True when the pass failed because another writer held the store.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, RefreshError::Store(StoreError::LockTimeout { .. }))
    }
}
