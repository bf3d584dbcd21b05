//! The immutable history record written once per successful snatch.

use super::vocab::{Format, Quality, ReleaseType, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: i64,
    pub tracker: String,
    pub snatched_at: i64,
    pub torrent_id: String,
    pub group_id: String,
    pub artists: Vec<String>,
    pub title: String,
    pub year: Option<i32>,
    pub release_type: ReleaseType,
    pub format: Format,
    pub quality: Quality,
    pub source: Source,
    pub has_log: bool,
    pub has_cue: bool,
    pub is_scene: bool,
    pub log_score: Option<i32>,
    pub tags: Vec<String>,
    pub size_bytes: i64,
    pub folder_name: String,
    pub matched_filter: String,
}

impl Release {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.artists.is_empty() {
            anyhow::bail!("release has no artists");
        }
        if self.tracker.is_empty() {
            anyhow::bail!("release has no tracker label");
        }
        if self.torrent_id.is_empty() {
            anyhow::bail!("release has no torrent id");
        }
        Ok(())
    }
}
