pub mod announce;
pub mod crons;
pub mod downloads;
pub mod filter;
pub mod fuse;
pub mod irc;
pub mod notify;
pub mod snatch;
pub mod stats;
pub mod tracker;

pub use filter::Filter;
pub use notify::Notifier;
pub use tracker::{TrackerClient, TrackerRegistry};
