use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Draw Duel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::matches::create_match,
        crate::routes::matches::join_match,
        crate::routes::matches::get_match,
        crate::routes::matches::update_match_status,
        crate::routes::matches::delete_match,
        crate::routes::events::publish_ready,
        crate::routes::events::publish_draw,
        crate::routes::events::match_stream,
        crate::routes::events::pre_match_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::CreateMatchRequest,
            crate::dto::matches::UpdateMatchStatusRequest,
            crate::dto::matches::MatchSummary,
            crate::dto::events::ReadyRequest,
            crate::dto::events::ReadyEvent,
            crate::dto::events::GuesserJoinedEvent,
            crate::dto::events::DrawBatchRequest,
            crate::dto::events::DrawBatchEvent,
            crate::dto::events::PathPoint,
            crate::dao::models::MatchStatus,
            crate::state::session_machine::Role,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "match", description = "Match lifecycle operations"),
        (name = "events", description = "Realtime streams and event publication"),
    )
)]
pub struct ApiDoc;
