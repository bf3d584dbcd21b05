//! The per-folder `origin.json` sidecar: the durable link between a release
//! folder on disk and the tracker records it came from. On any mismatch
//! between this file and the record store's denormalized projection, this
//! file wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(rename = "Tracker")]
    pub tracker_url: String,
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "GroupID")]
    pub group_id: i64,
    #[serde(rename = "TimeSnatched")]
    pub time_snatched: i64,
    #[serde(rename = "LastUpdatedMetadata")]
    pub last_updated_metadata: i64,
    #[serde(rename = "IsAlive")]
    pub is_alive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginSidecar {
    #[serde(rename = "Origins", default)]
    pub origins: HashMap<String, Origin>,
}

impl OriginSidecar {
    pub const FILE_NAME: &'static str = "origin.json";

    pub fn load(metadata_dir: &Path) -> anyhow::Result<Self> {
        let path = metadata_dir.join(Self::FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context_path(&path, "reading origin.json")?;
        let sidecar: OriginSidecar = serde_json::from_str(&raw)
            .with_context_path(&path, "parsing origin.json")?;
        Ok(sidecar)
    }

    pub fn save(&self, metadata_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(metadata_dir)?;
        let path = metadata_dir.join(Self::FILE_NAME);
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, raw).with_context_path(&path, "writing origin.json")?;
        Ok(())
    }

    /// Insert or overwrite a single tracker's origin block in place.
    pub fn upsert(&mut self, tracker: &str, origin: Origin) {
        self.origins.insert(tracker.to_string(), origin);
    }

    pub fn tracker_ids(&self) -> Vec<(String, i64)> {
        self.origins
            .iter()
            .map(|(tracker, o)| (tracker.clone(), o.id))
            .collect()
    }
}

trait WithContextPath<T> {
    fn with_context_path(self, path: &Path, op: &str) -> anyhow::Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> WithContextPath<T> for Result<T, E> {
    fn with_context_path(self, path: &Path, op: &str) -> anyhow::Result<T> {
        use anyhow::Context;
        self.with_context(|| format!("{op} at {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let mut sidecar = OriginSidecar::default();
        sidecar.upsert(
            "blue",
            Origin {
                tracker_url: "https://blue.example/".into(),
                id: 1000,
                group_id: 42,
                time_snatched: 1_700_000_000,
                last_updated_metadata: 1_700_000_001,
                is_alive: true,
            },
        );

        sidecar.save(dir.path()).unwrap();
        let loaded = OriginSidecar::load(dir.path()).unwrap();
        assert_eq!(sidecar, loaded);
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let sidecar = OriginSidecar::load(dir.path()).unwrap();
        assert!(sidecar.origins.is_empty());
    }
}
