use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the jamstats server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::dashboard::index,
        crate::routes::api::status,
        crate::routes::api::snapshot,
        crate::routes::api::game,
        crate::routes::api::jams_tsv,
        crate::routes::sse::updates,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::status::ConnectionStateDto,
            crate::dto::status::FeedStatusResponse,
            crate::dto::status::PublishInfo,
            crate::dto::game::GameResponse,
            crate::dto::game::GameSummaryDto,
            crate::dto::game::TeamTotalsDto,
            crate::dto::game::TeamReportDto,
            crate::dto::game::JamDto,
            crate::dto::game::TeamJamDto,
            crate::dto::game::JammerLineDto,
            crate::dto::game::SkaterPenaltiesDto,
            crate::dto::game::RosterLineDto,
            crate::dto::game::RecentPenaltyDto,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "api", description = "Game data as JSON and TSV"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "dashboard", description = "HTML dashboard"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/",
            "/healthcheck",
            "/api/status",
            "/api/snapshot",
            "/api/game",
            "/api/jams.tsv",
            "/sse/updates",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
