//! The record store: a single SQLite file holding every collected stats
//! sample and every snatched release, accessed through per-entity table
//! modules rather than a generic query builder.

pub mod engine;
pub mod tables;

pub use engine::{setup_sqlite, DbEngine};
pub use tables::{DownloadTable, FuseTable, ReleaseTable, StatsTable};
