use axum::{Router, extract::State, response::Html, routing::get};

use crate::{services::dashboard_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/",
    tag = "dashboard",
    responses((status = 200, description = "Auto-refreshing HTML dashboard", content_type = "text/html", body = String))
)]
/// Render the game dashboard.
pub async fn index(State(state): State<SharedState>) -> Html<String> {
    Html(dashboard_service::render(&state).await)
}

/// Configure the dashboard route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/", get(index))
}
