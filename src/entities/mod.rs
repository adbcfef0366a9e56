use chrono::{DateTime, Utc};

pub mod models;
pub mod player;
pub mod score;
pub mod team;

pub use models::{Player, Score, StoreEntry, Team};

use crate::error::CodecError;

/// Bucket holding every known team.
pub const TEAMS_BUCKET: &str = "teams";
/// Bucket holding every known player.
pub const PLAYERS_BUCKET: &str = "players";

/// Per-kind capability used by the refresh pass: how a record is keyed,
/// how it is serialized, and when a stored copy already represents it.
pub trait SyncEntity {
    /// Human-readable kind for logging.
    const KIND: &'static str;

    /// Stable identity derived only from the record's semantic fields.
    fn key(&self) -> Result<Vec<u8>, CodecError>;

    /// Storage payload for this record, captured at `captured_at`.
    fn encode(&self, captured_at: DateTime<Utc>) -> Result<Vec<u8>, CodecError>;

    /// Whether `existing` (the payload currently stored under this record's
    /// key, if any) already represents the record.
    fn is_fresh(&self, existing: Option<&[u8]>) -> Result<bool, CodecError>;

    /// Bucket this record belongs in, when the record itself determines it.
    fn home_bucket(&self) -> Option<String> {
        None
    }
}

/// Reject empty or whitespace-only key fields.
pub(crate) fn require<'a>(
    entity: &'static str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, CodecError> {
    if value.trim().is_empty() {
        return Err(CodecError::MissingField { entity, field });
    }
    Ok(value)
}
