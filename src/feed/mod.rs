//! Live scoreboard feed: decoding, merging and throttled publication of the
//! game-state document.

pub mod client;
pub mod merger;
pub mod message;
pub mod path;
pub mod publisher;
pub mod supervisor;

pub use client::{ConnectionError, ConnectionState, Endpoint, ScoreboardClient, ShutdownHandle};
pub use merger::{MergeError, MergeReport, SnapshotMerger};
pub use message::{Change, DecodeError, Entry, UpdateMessage};
pub use path::{Path, PathError};
pub use publisher::{PublishedSnapshot, SnapshotPublisher, SnapshotView};
