//! A denormalized view of a release folder, rebuilt on each library scan,
//! used to answer the virtual filesystem's facet queries without touching
//! the tracker-metadata JSON on every `readdir`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuseEntry {
    pub id: i64,
    pub folder_name: String,
    pub artists: Vec<String>,
    pub tags: Vec<String>,
    pub title: String,
    pub year: Option<i32>,
    pub trackers: Vec<String>,
    pub record_label: Option<String>,
    pub source: String,
    pub format: String,
}

/// Top-level facets exposed by the virtual filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Artists,
    Tags,
    Labels,
    Years,
}

impl Facet {
    pub fn all() -> &'static [Facet] {
        &[Facet::Artists, Facet::Tags, Facet::Labels, Facet::Years]
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Facet::Artists => "artists",
            Facet::Tags => "tags",
            Facet::Labels => "labels",
            Facet::Years => "years",
        }
    }

    /// The distinct facet values an entry contributes, paired with the
    /// entry so each value can be used as an index key.
    pub fn values(&self, entry: &FuseEntry) -> Vec<String> {
        match self {
            Facet::Artists => entry.artists.clone(),
            Facet::Tags => entry.tags.clone(),
            Facet::Labels => entry.record_label.iter().cloned().collect(),
            Facet::Years => entry.year.iter().map(|y| y.to_string()).collect(),
        }
    }
}
