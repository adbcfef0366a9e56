use chrono::{DateTime, Utc};

use super::{require, SyncEntity, Team};
use crate::error::CodecError;

impl SyncEntity for Team {
    const KIND: &'static str = "team";

    fn key(&self) -> Result<Vec<u8>, CodecError> {
        Ok(require(Self::KIND, "short_name", &self.short_name)?
            .as_bytes()
            .to_vec())
    }

    fn encode(&self, _captured_at: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    // First write wins: teams do not change once created.
    fn is_fresh(&self, existing: Option<&[u8]>) -> Result<bool, CodecError> {
        Ok(existing.is_some())
    }
}
