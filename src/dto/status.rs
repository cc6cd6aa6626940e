use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::format_system_time, feed::ConnectionState, feed::PublishedSnapshot};

/// Scoreboard connection state as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStateDto {
    /// No connection.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Receiving updates.
    Connected,
    /// The last connection attempt or connection failed.
    Failed {
        /// Failure description.
        reason: String,
    },
}

impl From<ConnectionState> for ConnectionStateDto {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self::Disconnected,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Connected => Self::Connected,
            ConnectionState::Failed(reason) => Self::Failed { reason },
        }
    }
}

/// Metadata of the latest published snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishInfo {
    /// Publish counter.
    pub sequence: u64,
    /// RFC 3339 publish time.
    pub published_at: String,
    /// Scoreboard messages merged when the snapshot was taken.
    pub messages_merged: u64,
}

impl From<&PublishedSnapshot> for PublishInfo {
    fn from(snapshot: &PublishedSnapshot) -> Self {
        Self {
            sequence: snapshot.sequence,
            published_at: format_system_time(snapshot.published_at),
            messages_merged: snapshot.messages_merged,
        }
    }
}

/// Response of `/api/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedStatusResponse {
    /// `live` or the path of the served file.
    pub source: String,
    /// Scoreboard connection state.
    pub connection: ConnectionStateDto,
    /// Minimum seconds between publishes.
    pub publish_interval_seconds: u64,
    /// Latest publish, absent until the first snapshot.
    pub last_publish: Option<PublishInfo>,
}
