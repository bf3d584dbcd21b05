//! The data model: types that cross the record-store, filter-engine, and
//! downloads-indexer boundaries.

pub mod announce;
pub mod download_entry;
pub mod fuse_entry;
pub mod metadata;
pub mod origin;
pub mod release;
pub mod stats_entry;
pub mod vocab;

pub use announce::Announce;
pub use download_entry::{DownloadEntry, DownloadState};
pub use fuse_entry::{Facet, FuseEntry};
pub use metadata::{ArtistCredit, ArtistRole, Metadata, TrackInfo};
pub use origin::{Origin, OriginSidecar};
pub use release::Release;
pub use stats_entry::{
    check_progress, deltas, ProgressGuardConfig, ProgressOutcome, SnatchStatsEntry, StatsDelta,
    StatsEntry,
};
pub use vocab::{Format, Quality, ReleaseType, Source};
