use std::time::SystemTime;

use tracing::warn;

use crate::{
    dto::health::HealthResponse,
    feed::ConnectionState,
    state::{FeedSource, SharedState},
};

/// Report degraded while a live feed is not connected.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let connection = state.connection_state();
    let snapshot_age_seconds = state.snapshot().ready().map(|snapshot| {
        SystemTime::now()
            .duration_since(snapshot.published_at)
            .unwrap_or_default()
            .as_secs_f64()
    });

    let degraded = match state.source() {
        FeedSource::Live => connection != ConnectionState::Connected,
        FeedSource::File(_) => snapshot_age_seconds.is_none(),
    };
    if degraded {
        warn!(connection = %connection, "scoreboard feed unavailable (degraded mode)");
        HealthResponse::degraded(connection.into(), snapshot_age_seconds)
    } else {
        HealthResponse::ok(connection.into(), snapshot_age_seconds)
    }
}
