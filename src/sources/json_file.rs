use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::provider::{RecordSource, SourceSnapshot};

/// Record source backed by a JSON snapshot file written by an upstream
/// fetcher, shaped as `{"teams": [...], "players": [...], "scores": [...]}`.
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("json:{}", path.display());
        JsonFileSource { path, name }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_snapshot(&self) -> Result<SourceSnapshot> {
        debug!("Reading snapshot from {}", self.path.display());
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let snapshot: SourceSnapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse snapshot {}", self.path.display()))?;
        Ok(snapshot)
    }
}
