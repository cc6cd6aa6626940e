use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use serde_json::Value;

use crate::{
    dto::{game::GameResponse, status::FeedStatusResponse},
    error::AppError,
    services::{feed_service, game_service},
    state::SharedState,
};

/// Content type of the jam table export.
pub const TSV_CONTENT_TYPE: &str = "text/tab-separated-values; charset=utf-8";

#[utoipa::path(
    get,
    path = "/api/status",
    tag = "api",
    responses((status = 200, description = "Feed connection and publish status", body = FeedStatusResponse))
)]
/// Report the feed connection and the latest publish.
pub async fn status(State(state): State<SharedState>) -> Json<FeedStatusResponse> {
    Json(feed_service::feed_status(&state))
}

#[utoipa::path(
    get,
    path = "/api/snapshot",
    tag = "api",
    responses(
        (status = 200, description = "Latest published scoreboard document", body = Object),
        (status = 503, description = "No snapshot published yet")
    )
)]
/// Return the latest published scoreboard document.
pub async fn snapshot(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    let snapshot = feed_service::latest_snapshot(&state)?;
    Ok(Json(snapshot.document.clone()))
}

#[utoipa::path(
    get,
    path = "/api/game",
    tag = "api",
    responses(
        (status = 200, description = "Game built from the latest snapshot", body = GameResponse),
        (status = 503, description = "No usable game data yet")
    )
)]
/// Return the game and its statistics.
pub async fn game(State(state): State<SharedState>) -> Result<Json<GameResponse>, AppError> {
    let (snapshot, game) = game_service::current_game(&state).await?;
    Ok(Json(GameResponse::new(&snapshot, &game)))
}

#[utoipa::path(
    get,
    path = "/api/jams.tsv",
    tag = "api",
    responses(
        (status = 200, description = "Jam table export", content_type = "text/tab-separated-values", body = String),
        (status = 503, description = "No usable game data yet")
    )
)]
/// Export the jam table as TSV.
pub async fn jams_tsv(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let body = game_service::jams_tsv(&state).await?;
    Ok(([(header::CONTENT_TYPE, TSV_CONTENT_TYPE)], body))
}

/// Configure the JSON API routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/status", get(status))
        .route("/api/snapshot", get(snapshot))
        .route("/api/game", get(game))
        .route("/api/jams.tsv", get(jams_tsv))
}
