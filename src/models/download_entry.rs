//! The reconciled view of an on-disk release folder maintained by the
//! downloads indexer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    Unsorted,
    Accepted,
    Rejected,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Unsorted => "unsorted",
            DownloadState::Accepted => "accepted",
            DownloadState::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub id: i64,
    pub folder_name: String,
    pub state: DownloadState,
    pub trackers: Vec<(String, String)>,
    pub artists: Vec<String>,
    pub has_tracker_metadata: bool,
    pub schema_version: i32,
}

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

impl DownloadEntry {
    pub fn new(folder_name: String) -> Self {
        DownloadEntry {
            id: 0,
            folder_name,
            state: DownloadState::Unsorted,
            trackers: Vec::new(),
            artists: Vec::new(),
            has_tracker_metadata: false,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}
