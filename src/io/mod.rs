//! File formats read by the command line tools.

pub mod scoreboard_json;

pub use scoreboard_json::{LoadError, read_snapshot_file};
