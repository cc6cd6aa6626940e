use axum::Router;

use crate::state::SharedState;

pub mod api;
pub mod dashboard;
pub mod docs;
pub mod health;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let app_router = health::router()
        .merge(dashboard::router())
        .merge(api::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    app_router.merge(docs_router).with_state(state)
}
