use chrono::{DateTime, Utc};

use super::{require, Player, SyncEntity};
use crate::error::CodecError;

impl SyncEntity for Player {
    const KIND: &'static str = "player";

    fn key(&self) -> Result<Vec<u8>, CodecError> {
        Ok(require(Self::KIND, "name", &self.name)?.as_bytes().to_vec())
    }

    fn encode(&self, _captured_at: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn is_fresh(&self, existing: Option<&[u8]>) -> Result<bool, CodecError> {
        Ok(existing.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_full_name() {
        let p = Player::from_names("Bukayo", "Saka", "Saka");
        assert_eq!(p.key().unwrap(), b"Bukayo Saka".to_vec());
    }

    #[test]
    fn blank_full_name_has_no_key() {
        let p = Player {
            name: " ".into(),
            first_name: String::new(),
            second_name: String::new(),
            web_name: "???".into(),
        };
        assert!(p.key().is_err());
    }

    #[test]
    fn payload_round_trips_as_plain_record() {
        let p = Player::from_names("Cole", "Palmer", "Palmer");
        let payload = p.encode(Utc::now()).unwrap();
        let back: Player = serde_json::from_slice(&payload).unwrap();
        assert_eq!(back, p);
        assert!(p.is_fresh(Some(&payload)).unwrap());
    }
}
