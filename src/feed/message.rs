//! Decoding of scoreboard state frames into ordered update messages.

use serde_json::{Map, Value};
use thiserror::Error;

/// Key of the scoreboard envelope carrying path/value pairs.
const STATE_KEY: &str = "state";

/// Reason a frame could not be turned into an [`UpdateMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not valid JSON (truncated, garbage, ...).
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame decoded to something other than a JSON object.
    #[error("expected a json object, got {0}")]
    NotAnObject(&'static str),
    /// The `state` member of the envelope was not an object.
    #[error("`state` member is {0}, expected an object")]
    StateNotAnObject(&'static str),
    /// Binary frame whose payload is not UTF-8.
    #[error("binary frame is not valid utf-8")]
    NotUtf8,
}

/// What an entry does to the addressed path.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Replace (or create) the value at the path.
    Set(Value),
    /// Remove the path. The scoreboard reports removed keys as `null`.
    Delete,
}

impl From<Value> for Change {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Change::Delete,
            other => Change::Set(other),
        }
    }
}

/// One `path -> change` pair of an update message.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Dotted path as sent by the server.
    pub path: String,
    /// Change to apply at `path`.
    pub change: Change,
}

/// Ordered set of changes received in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateMessage {
    entries: Vec<Entry>,
}

impl UpdateMessage {
    /// Build a message from explicit entries, preserving their order.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Decode a text frame.
    ///
    /// Accepts the scoreboard envelope `{"state": {...}}`, whose other
    /// top-level members are ignored, or a bare `{"path": value}` object.
    /// An envelope without a `state` member therefore decodes as a bare
    /// object.
    pub fn from_json_str(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode a binary frame carrying UTF-8 JSON.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
        Self::from_json_str(text)
    }

    /// Decode an already-parsed JSON document.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut object) = value else {
            return Err(DecodeError::NotAnObject(kind(&value)));
        };

        let pairs = match object.remove(STATE_KEY) {
            Some(Value::Object(state)) => state,
            Some(other) if object.is_empty() => {
                // A bare `{"state": 3}` is a legitimate single-path update.
                let mut single = Map::new();
                single.insert(STATE_KEY.to_string(), other);
                single
            }
            Some(other) => return Err(DecodeError::StateNotAnObject(kind(&other))),
            None => object,
        };

        let entries = pairs
            .into_iter()
            .map(|(path, value)| Entry {
                path,
                change: value.into(),
            })
            .collect();
        Ok(Self { entries })
    }

    /// Entries in the order they must be applied.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a message carrying no change.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for UpdateMessage {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_scoreboard_envelope_in_order() {
        let message = UpdateMessage::from_json_str(
            r#"{"state": {"ScoreBoard.Version(release)": "v5.0.3", "ScoreBoard.CurrentGame.Team(1).Name": "Rebels", "ScoreBoard.CurrentGame.Jam": null}}"#,
        )
        .unwrap();

        let paths: Vec<_> = message.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "ScoreBoard.Version(release)",
                "ScoreBoard.CurrentGame.Team(1).Name",
                "ScoreBoard.CurrentGame.Jam"
            ]
        );
        assert_eq!(message.entries()[1].change, Change::Set(json!("Rebels")));
        assert_eq!(message.entries()[2].change, Change::Delete);
    }

    #[test]
    fn decodes_bare_object() {
        let message = UpdateMessage::from_json_str(r#"{"jam.1.score": 4}"#).unwrap();
        assert_eq!(message.len(), 1);
        assert_eq!(message.entries()[0].path, "jam.1.score");
        assert_eq!(message.entries()[0].change, Change::Set(json!(4)));
    }

    #[test]
    fn envelope_siblings_are_ignored() {
        let message =
            UpdateMessage::from_json_str(r#"{"authorization": "x", "state": {"a": 1}}"#).unwrap();
        assert_eq!(message.len(), 1);
        assert_eq!(message.entries()[0].path, "a");
    }

    #[test]
    fn rejects_truncated_and_non_object_frames() {
        assert!(matches!(
            UpdateMessage::from_json_str(r#"{"state": {"a": 1"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            UpdateMessage::from_json_str("[1, 2]"),
            Err(DecodeError::NotAnObject("an array"))
        ));
        assert!(matches!(
            UpdateMessage::from_json_str(r#"{"state": [1], "other": 2}"#),
            Err(DecodeError::StateNotAnObject("an array"))
        ));
        assert!(matches!(
            UpdateMessage::from_json_bytes(&[0xff, 0xfe]),
            Err(DecodeError::NotUtf8)
        ));
    }
}
