use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/updates",
    tag = "sse",
    responses((status = 200, description = "One `snapshot` event per publish", content_type = "text/event-stream", body = String))
)]
/// Stream snapshot publications to dashboards.
pub async fn updates(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE connection");
    sse_service::to_sse_stream(sse_service::subscribe_snapshots(&state))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/updates", get(updates))
}
