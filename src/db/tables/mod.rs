pub mod download_table;
pub mod fuse_table;
pub mod release_table;
pub mod stats_table;

pub use download_table::DownloadTable;
pub use fuse_table::FuseTable;
pub use release_table::ReleaseTable;
pub use stats_table::StatsTable;
