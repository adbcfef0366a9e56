use chrono::{DateTime, Utc};

use super::{require, Score, StoreEntry, SyncEntity};
use crate::error::CodecError;

impl Score {
    /// Bucket name for a gameweek: its decimal text form.
    pub fn bucket_for(gameweek: u32) -> String {
        gameweek.to_string()
    }
}

impl SyncEntity for Score {
    const KIND: &'static str = "score";

    /// `minute_home_homeGoals_away_awayGoals`, e.g. `45_ARS_1_CHE_0`.
    ///
    /// Scorer and assist are deliberately left out: a corrected scorer name
    /// lands on the same key and is caught by [`Score::is_fresh`].
    fn key(&self) -> Result<Vec<u8>, CodecError> {
        let minute = require(Self::KIND, "minute", &self.minute)?;
        let home = require(Self::KIND, "home_team", &self.home_team)?;
        let away = require(Self::KIND, "away_team", &self.away_team)?;
        if self.gameweek == 0 {
            return Err(CodecError::InvalidField {
                entity: Self::KIND,
                field: "gameweek",
                reason: "gameweeks start at 1".into(),
            });
        }
        let key = format!(
            "{}_{}_{}_{}_{}",
            minute, home, self.home_team_goals, away, self.away_team_goals
        );
        Ok(key.into_bytes())
    }

    fn encode(&self, captured_at: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        let entry = StoreEntry {
            score: self.clone(),
            timestamp: captured_at,
            processed: false,
        };
        Ok(serde_json::to_vec(&entry)?)
    }

    /// Fresh only when the stored scorer and assist match exactly.
    fn is_fresh(&self, existing: Option<&[u8]>) -> Result<bool, CodecError> {
        let Some(raw) = existing else {
            return Ok(false);
        };
        let stored: StoreEntry = serde_json::from_slice(raw)?;
        Ok(stored.score.goal_player_name == self.goal_player_name
            && stored.score.assist_player_name == self.assist_player_name)
    }

    fn home_bucket(&self) -> Option<String> {
        Some(Score::bucket_for(self.gameweek))
    }
}
