pub mod dashboard_service;
pub mod documentation;
pub mod feed_service;
pub mod game_service;
pub mod health_service;
pub mod sse_service;
