use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Field names follow the upstream record shape so stored payloads stay
// readable across versions of the syncer.

/// A goal event within a gameweek fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Score {
    /// Match minute as reported by the source, e.g. "45" or "90+2"
    pub minute: String,
    pub goal_player_name: String,
    /// Empty when the goal was unassisted
    #[serde(default)]
    pub assist_player_name: String,
    pub home_team: String,
    pub away_team: String,
    pub home_team_goals: u32,
    pub away_team_goals: u32,
    pub gameweek: u32,
}

/// A Premier League team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Team {
    pub name: String,
    /// Three-letter code, e.g. "ARS"
    pub short_name: String,
}

/// A registered player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Player {
    /// "<first> <second>", the player's identity in the store
    pub name: String,
    pub first_name: String,
    pub second_name: String,
    /// Short display name used on the fantasy site
    pub web_name: String,
}

impl Player {
    /// Build a player whose full name is derived from first and second name.
    pub fn from_names(first_name: &str, second_name: &str, web_name: &str) -> Self {
        Player {
            name: format!("{} {}", first_name, second_name),
            first_name: first_name.to_string(),
            second_name: second_name.to_string(),
            web_name: web_name.to_string(),
        }
    }
}

/// A score as persisted in a gameweek bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreEntry {
    pub score: Score,
    /// When this version of the score was captured
    pub timestamp: DateTime<Utc>,
    /// Set by downstream consumers once the event has been announced
    #[serde(default)]
    pub processed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_full_name_joins_first_and_second() {
        let p = Player::from_names("Mohamed", "Salah", "Salah");
        assert_eq!(p.name, "Mohamed Salah");
        assert_eq!(p.web_name, "Salah");
    }

    #[test]
    fn store_entry_reads_upstream_payload() {
        let raw = r#"{
            "Score": {
                "Minute": "45",
                "GoalPlayerName": "A. Smith",
                "AssistPlayerName": "",
                "HomeTeam": "ARS",
                "AwayTeam": "CHE",
                "HomeTeamGoals": 1,
                "AwayTeamGoals": 0,
                "Gameweek": 7
            },
            "Timestamp": "2018-01-20T15:45:12.123456789+01:00",
            "Processed": true
        }"#;
        let entry: StoreEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.score.home_team, "ARS");
        assert_eq!(entry.score.gameweek, 7);
        assert!(entry.processed);
        assert_eq!(entry.timestamp.to_rfc3339(), "2018-01-20T14:45:12.123456789+00:00");
    }

    #[test]
    fn missing_assist_defaults_to_empty() {
        let raw = r#"{"Minute":"12","GoalPlayerName":"Kane","HomeTeam":"TOT","AwayTeam":"LIV",
                      "HomeTeamGoals":1,"AwayTeamGoals":0,"Gameweek":3}"#;
        let score: Score = serde_json::from_str(raw).unwrap();
        assert_eq!(score.assist_player_name, "");
    }
}
