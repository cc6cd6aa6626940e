//! Loader for scoreboard JSON exports (`{"state": {...}}` files).

use std::{fs, path::Path};

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::feed::{DecodeError, SnapshotMerger, UpdateMessage};

/// Failure to turn a file into a snapshot document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// File that was requested.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The contents are not a scoreboard state document.
    #[error("{path} is not a scoreboard export: {source}")]
    Decode {
        /// File that was requested.
        path: String,
        /// Underlying error.
        #[source]
        source: DecodeError,
    },
}

/// Read a scoreboard export into the same nested layout the live feed builds.
pub fn read_snapshot_file(path: impl AsRef<Path>) -> Result<Value, LoadError> {
    let path = path.as_ref();
    let shown = path.display().to_string();
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: shown.clone(),
        source,
    })?;
    let message = UpdateMessage::from_json_bytes(&bytes).map_err(|source| LoadError::Decode {
        path: shown.clone(),
        source,
    })?;

    let mut merger = SnapshotMerger::default();
    let report = merger.apply(message);
    info!(
        path = %shown,
        applied = report.applied,
        skipped = report.skipped,
        "loaded scoreboard export"
    );
    Ok(merger.into_document())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    #[test]
    fn expands_flat_keys_into_nested_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"state": {{"ScoreBoard.Version(release)": "v5.0.3", "ScoreBoard.Game(g1).Team(1).Name": "Rebels"}}}}"#
        )
        .unwrap();

        let document = read_snapshot_file(file.path()).unwrap();
        assert_eq!(
            document["ScoreBoard"]["Game(g1)"]["Team(1)"]["Name"],
            json!("Rebels")
        );
        assert_eq!(document["ScoreBoard"]["Version(release)"], json!("v5.0.3"));
    }

    #[test]
    fn missing_and_malformed_files_are_errors() {
        assert!(matches!(
            read_snapshot_file("/definitely/not/here.json"),
            Err(LoadError::Io { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        assert!(matches!(
            read_snapshot_file(file.path()),
            Err(LoadError::Decode { .. })
        ));
    }
}
