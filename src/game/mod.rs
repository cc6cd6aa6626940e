//! Derby game model, its builder and the statistics computed from it.

pub mod builder;
pub mod model;
pub mod stats;

pub use builder::{BuildError, build_from_snapshot};
pub use model::{DerbyGame, Jam, Penalty, PenaltyStatus, Skater, Team, TeamJam};

#[cfg(test)]
pub(crate) fn sample_snapshot() -> serde_json::Value {
    use crate::feed::{SnapshotMerger, UpdateMessage};

    let message =
        UpdateMessage::from_json_str(include_str!("../../tests/data/sample_game.json")).unwrap();
    let mut merger = SnapshotMerger::default();
    merger.apply(message);
    merger.into_document()
}
