use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::status::ConnectionStateDto;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Scoreboard connection state.
    pub connection: ConnectionStateDto,
    /// Seconds since the latest published snapshot, if any.
    pub snapshot_age_seconds: Option<f64>,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(connection: ConnectionStateDto, snapshot_age_seconds: Option<f64>) -> Self {
        Self {
            status: "ok".to_string(),
            connection,
            snapshot_age_seconds,
        }
    }

    /// Create a health response indicating the scoreboard feed is down.
    pub fn degraded(connection: ConnectionStateDto, snapshot_age_seconds: Option<f64>) -> Self {
        Self {
            status: "degraded".to_string(),
            connection,
            snapshot_age_seconds,
        }
    }
}
