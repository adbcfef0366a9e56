use std::collections::BTreeMap;

use super::{refresh, RefreshReport};
use crate::entities::{Player, Score, Team, PLAYERS_BUCKET, TEAMS_BUCKET};
use crate::error::RefreshError;
use crate::store::StoreOptions;

/// A same-kind batch of records as handed over by a record source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    Scores { gameweek: u32, records: Vec<Score> },
    Teams(Vec<Team>),
    Players(Vec<Player>),
}

impl Batch {
    pub fn kind(&self) -> &'static str {
        match self {
            Batch::Scores { .. } => "scores",
            Batch::Teams(_) => "teams",
            Batch::Players(_) => "players",
        }
    }

    pub fn bucket_name(&self) -> String {
        match self {
            Batch::Scores { gameweek, .. } => Score::bucket_for(*gameweek),
            Batch::Teams(_) => TEAMS_BUCKET.to_string(),
            Batch::Players(_) => PLAYERS_BUCKET.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::Scores { records, .. } => records.len(),
            Batch::Teams(records) => records.len(),
            Batch::Players(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Refresh one batch into the bucket its kind maps to.
pub fn refresh_batch(options: &StoreOptions, batch: &Batch) -> Result<RefreshReport, RefreshError> {
    match batch {
        Batch::Scores { gameweek, records } => refresh_scores(options, *gameweek, records),
        Batch::Teams(teams) => refresh(options, TEAMS_BUCKET, teams),
        Batch::Players(players) => refresh(options, PLAYERS_BUCKET, players),
    }
}

/// Refresh the bucket of `gameweek` with its scores. Scores tagged with a
/// different gameweek are skipped.
pub fn refresh_scores(
    options: &StoreOptions,
    gameweek: u32,
    scores: &[Score],
) -> Result<RefreshReport, RefreshError> {
    let bucket = Score::bucket_for(gameweek);
    if scores.is_empty() {
        return refresh::<Score>(options, &bucket, &[]);
    }
    if gameweek == 0 {
        return Err(RefreshError::InvalidGameweek(gameweek));
    }
    refresh(options, &bucket, scores)
}

/// Split scores into one batch per gameweek, in ascending gameweek order.
pub fn group_scores_by_gameweek(scores: Vec<Score>) -> Vec<Batch> {
    let mut by_gameweek: BTreeMap<u32, Vec<Score>> = BTreeMap::new();
    for score in scores {
        by_gameweek.entry(score.gameweek).or_default().push(score);
    }
    by_gameweek
        .into_iter()
        .map(|(gameweek, records)| Batch::Scores { gameweek, records })
        .collect()
}
