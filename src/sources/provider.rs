use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::{Player, Score, Team};
use crate::sync::{group_scores_by_gameweek, Batch};

/// Everything a source produced in one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl SourceSnapshot {
    /// Teams first, then players, then one score batch per gameweek.
    pub fn into_batches(self) -> Vec<Batch> {
        let mut batches = vec![Batch::Teams(self.teams), Batch::Players(self.players)];
        batches.extend(group_scores_by_gameweek(self.scores));
        batches
    }
}

/// Trait that every record source must implement.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Return the latest snapshot of teams, players and scores.
    async fn fetch_snapshot(&self) -> Result<SourceSnapshot>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
