//! Folds update messages into the working copy of the game document.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    message::{Change, Entry, UpdateMessage},
    path::{Path, PathError, as_index},
};

/// Path prefix of the scoreboard clocks, which tick several times per second.
pub const DEFAULT_CLOCK_PREFIX: &str = "ScoreBoard.CurrentGame.Clock";

/// Reason a single entry could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// The path string itself is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),
    /// The path walks through a value that cannot hold the next segment.
    #[error("`{path}`: segment `{segment}` cannot be resolved inside {found}")]
    NotAContainer {
        /// Full path of the entry.
        path: String,
        /// Segment that could not be resolved.
        segment: String,
        /// Kind of value found where a container was expected.
        found: &'static str,
    },
    /// A list index points past the end of the list.
    #[error("`{path}`: index {index} is out of range for a list of {len}")]
    IndexOutOfRange {
        /// Full path of the entry.
        path: String,
        /// Requested index.
        index: usize,
        /// Current list length.
        len: usize,
    },
}

/// Outcome of applying one [`UpdateMessage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Entries applied (including no-op deletes).
    pub applied: usize,
    /// Entries skipped because of a [`MergeError`].
    pub skipped: usize,
    /// True when at least one non-clock value changed.
    pub dirty: bool,
}

/// Single-writer owner of the mutable game document.
///
/// The merger is driven from exactly one task, so it needs no internal locking.
#[derive(Debug, Clone)]
pub struct SnapshotMerger {
    document: Value,
    clock_prefixes: Vec<String>,
    revision: u64,
    messages_merged: u64,
}

impl Default for SnapshotMerger {
    fn default() -> Self {
        Self::new(vec![DEFAULT_CLOCK_PREFIX.to_string()])
    }
}

impl SnapshotMerger {
    /// Create a merger over an empty document.
    ///
    /// Changes under any of `clock_prefixes` are applied but do not bump the
    /// revision, so they never trigger a publish on their own.
    pub fn new(clock_prefixes: Vec<String>) -> Self {
        Self {
            document: Value::Object(Map::new()),
            clock_prefixes,
            revision: 0,
            messages_merged: 0,
        }
    }

    /// Current working document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Consume the merger, keeping the document.
    pub fn into_document(self) -> Value {
        self.document
    }

    /// Counter bumped whenever a meaningful (non-clock) value changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of messages applied since creation.
    pub fn messages_merged(&self) -> u64 {
        self.messages_merged
    }

    /// Apply every entry of `message` in order. Failing entries are logged and skipped.
    pub fn apply(&mut self, message: UpdateMessage) -> MergeReport {
        let mut report = MergeReport::default();

        for entry in message {
            match self.apply_entry(entry) {
                Ok(EntryOutcome { changed, clock }) => {
                    report.applied += 1;
                    if changed && !clock {
                        report.dirty = true;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "skipping update entry");
                    report.skipped += 1;
                }
            }
        }

        self.messages_merged += 1;
        if report.dirty {
            self.revision += 1;
        }
        debug!(
            applied = report.applied,
            skipped = report.skipped,
            dirty = report.dirty,
            revision = self.revision,
            "merged update message"
        );
        report
    }

    fn apply_entry(&mut self, entry: Entry) -> Result<EntryOutcome, MergeError> {
        let path = Path::parse(&entry.path)?;
        let clock = self
            .clock_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix));

        let changed = match entry.change {
            Change::Set(value) => set_at(&mut self.document, path.segments(), value, &path)?,
            Change::Delete => delete_at(&mut self.document, path.segments(), &path)?,
        };

        Ok(EntryOutcome { changed, clock })
    }
}

struct EntryOutcome {
    changed: bool,
    clock: bool,
}

fn set_at(
    node: &mut Value,
    segments: &[String],
    value: Value,
    path: &Path,
) -> Result<bool, MergeError> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(false);
    };

    match node {
        Value::Object(map) => {
            if rest.is_empty() {
                if map.get(head) == Some(&value) {
                    return Ok(false);
                }
                map.insert(head.clone(), value);
                return Ok(true);
            }
            let child = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            set_at(child, rest, value, path)
        }
        Value::Array(items) => {
            let index = as_index(head).ok_or_else(|| not_a_container(path, head, "a list"))?;
            let len = items.len();
            if index > len {
                return Err(MergeError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len,
                });
            }

            if rest.is_empty() {
                if index == len {
                    items.push(value);
                } else if items[index] == value {
                    return Ok(false);
                } else {
                    items[index] = value;
                }
                return Ok(true);
            }

            if index == len {
                items.push(Value::Object(Map::new()));
            }
            set_at(&mut items[index], rest, value, path)
        }
        scalar => Err(not_a_container(path, head, kind(scalar))),
    }
}

fn delete_at(node: &mut Value, segments: &[String], path: &Path) -> Result<bool, MergeError> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(false);
    };

    match node {
        Value::Object(map) => {
            if rest.is_empty() {
                return Ok(map.shift_remove(head).is_some());
            }
            match map.get_mut(head) {
                Some(child) => delete_at(child, rest, path),
                None => Ok(false),
            }
        }
        Value::Array(items) => {
            let index = as_index(head).ok_or_else(|| not_a_container(path, head, "a list"))?;
            if rest.is_empty() {
                if index < items.len() {
                    // Later elements shift down, as in the server's list model.
                    items.remove(index);
                    return Ok(true);
                }
                return Ok(false);
            }
            match items.get_mut(index) {
                Some(child) => delete_at(child, rest, path),
                None => Ok(false),
            }
        }
        scalar => Err(not_a_container(path, head, kind(scalar))),
    }
}

fn not_a_container(path: &Path, segment: &str, found: &'static str) -> MergeError {
    MergeError::NotAContainer {
        path: path.to_string(),
        segment: segment.to_string(),
        found,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Look up a dotted path in a document, resolving index segments inside lists.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let path = Path::parse(path).ok()?;
    path.segments()
        .iter()
        .try_fold(document, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => as_index(segment).and_then(|index| items.get(index)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn frame(text: &str) -> UpdateMessage {
        UpdateMessage::from_json_str(text).unwrap()
    }

    #[test]
    fn later_messages_overwrite_earlier_ones() {
        let mut merger = SnapshotMerger::default();
        merger.apply(frame(r#"{"jam.1.score": 4}"#));
        merger.apply(frame(r#"{"jam.1.score": 7}"#));
        merger.apply(frame(r#"{"jam.2": {"score": 0}}"#));

        let doc = merger.document();
        assert_eq!(lookup(doc, "jam.1.score"), Some(&json!(7)));
        assert_eq!(lookup(doc, "jam.2.score"), Some(&json!(0)));
        assert_eq!(merger.messages_merged(), 3);
    }

    #[test]
    fn last_entry_wins_within_one_message() {
        let message = UpdateMessage::new(vec![
            Entry {
                path: "a.b".into(),
                change: Change::Set(json!(1)),
            },
            Entry {
                path: "a.b".into(),
                change: Change::Set(json!(2)),
            },
        ]);
        let mut merger = SnapshotMerger::default();
        let report = merger.apply(message);
        assert_eq!(report.applied, 2);
        assert_eq!(merger.document(), &json!({"a": {"b": 2}}));
    }

    #[test]
    fn batch_and_sequential_application_agree() {
        let frames = [
            r#"{"state": {"ScoreBoard.CurrentGame.Team(1).Name": "Rebels", "ScoreBoard.CurrentGame.Team(1).Score": 0}}"#,
            r#"{"state": {"ScoreBoard.CurrentGame.Team(1).Score": 4, "ScoreBoard.CurrentGame.Team(2).Name": "Rollers"}}"#,
            r#"{"state": {"ScoreBoard.CurrentGame.Team(2).Name": null, "ScoreBoard.CurrentGame.Team(1).Score": 9}}"#,
        ];

        let mut sequential = SnapshotMerger::default();
        for text in frames {
            sequential.apply(frame(text));
        }

        let mut combined = Vec::new();
        for text in frames {
            combined.extend(frame(text));
        }
        let mut batched = SnapshotMerger::default();
        batched.apply(UpdateMessage::new(combined));

        assert_eq!(sequential.document(), batched.document());
    }

    #[test]
    fn delete_removes_exactly_one_path_and_is_idempotent() {
        let mut merger = SnapshotMerger::default();
        merger.apply(frame(r#"{"a.b": 1, "a.c": 2}"#));

        let first = merger.apply(frame(r#"{"a.b": null}"#));
        assert!(first.dirty);
        assert_eq!(merger.document(), &json!({"a": {"c": 2}}));

        let second = merger.apply(frame(r#"{"a.b": null}"#));
        assert_eq!(second.skipped, 0);
        assert!(!second.dirty);
        assert_eq!(merger.document(), &json!({"a": {"c": 2}}));

        let missing_parent = merger.apply(frame(r#"{"x.y.z": null}"#));
        assert_eq!(missing_parent.skipped, 0);
        assert_eq!(merger.document(), &json!({"a": {"c": 2}}));
    }

    #[test]
    fn deleting_a_list_index_shifts_later_elements() {
        let mut merger = SnapshotMerger::default();
        merger.apply(frame(r#"{"trips": [10, 20, 30]}"#));
        merger.apply(frame(r#"{"trips.0": null}"#));
        assert_eq!(lookup(merger.document(), "trips"), Some(&json!([20, 30])));
        assert_eq!(lookup(merger.document(), "trips.0"), Some(&json!(20)));
    }

    #[test]
    fn list_indices_update_and_append() {
        let mut merger = SnapshotMerger::default();
        merger.apply(frame(r#"{"trips": [{"score": 1}]}"#));
        merger.apply(frame(r#"{"trips.0.score": 4, "trips.1.score": 2}"#));
        assert_eq!(
            lookup(merger.document(), "trips"),
            Some(&json!([{"score": 4}, {"score": 2}]))
        );

        let report = merger.apply(frame(r#"{"trips.5": 1}"#));
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn shape_conflicts_skip_only_the_offending_entry() {
        let mut merger = SnapshotMerger::default();
        merger.apply(frame(r#"{"period": 1}"#));

        let report = merger.apply(frame(
            r#"{"period.jam": 3, "period.3": null, "other": true, "bad..path": 1}"#,
        ));
        assert_eq!(report.skipped, 3);
        assert_eq!(report.applied, 1);
        assert_eq!(merger.document(), &json!({"period": 1, "other": true}));
    }

    #[test]
    fn unknown_paths_are_accepted() {
        let mut merger = SnapshotMerger::default();
        let report = merger.apply(frame(r#"{"ScoreBoard.Brand.New(field).Thing": [1, 2]}"#));
        assert_eq!(report.applied, 1);
        assert_eq!(
            lookup(merger.document(), "ScoreBoard.Brand.New(field).Thing.1"),
            Some(&json!(2))
        );
    }

    #[test]
    fn clock_updates_do_not_bump_revision() {
        let mut merger = SnapshotMerger::default();
        merger.apply(frame(r#"{"state": {"ScoreBoard.CurrentGame.Team(1).Score": 1}}"#));
        assert_eq!(merger.revision(), 1);

        let report = merger.apply(frame(
            r#"{"state": {"ScoreBoard.CurrentGame.Clock(Period).Time": 118000}}"#,
        ));
        assert!(!report.dirty);
        assert_eq!(merger.revision(), 1);
        assert_eq!(
            lookup(
                merger.document(),
                "ScoreBoard.CurrentGame.Clock(Period).Time"
            ),
            Some(&json!(118000))
        );

        let unchanged = merger.apply(frame(
            r#"{"state": {"ScoreBoard.CurrentGame.Team(1).Score": 1}}"#,
        ));
        assert!(!unchanged.dirty);
        assert_eq!(merger.revision(), 1);
    }
}
