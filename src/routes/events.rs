//! Event publication endpoints and the SSE bridges onto the bus topics.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::Sse,
    routing::{get, post},
};
use axum_valid::Valid;
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::events::{DrawBatchRequest, ReadyRequest},
    dto::identity::PlayerIdentity,
    error::AppError,
    services::{bus_events, relay, sse_service},
    state::SharedState,
};

/// Configure the event endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/matches/{id}/ready", post(publish_ready))
        .route("/matches/{id}/draw", post(publish_draw))
        .route("/matches/{id}/events", get(match_stream))
        .route("/matches/{id}/prematch/events", get(pre_match_stream))
}

/// Announce the caller's readiness on the pre-match topic.
#[utoipa::path(
    post,
    path = "/matches/{id}/ready",
    tag = "events",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    request_body = ReadyRequest,
    responses(
        (status = 202, description = "Ready event published"),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn publish_ready(
    State(state): State<SharedState>,
    _caller: PlayerIdentity,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ReadyRequest>>,
) -> Result<StatusCode, AppError> {
    bus_events::publish_ready(&state, id, payload.role);
    Ok(StatusCode::ACCEPTED)
}

/// Relay one draw batch from the guesser to the creator.
#[utoipa::path(
    post,
    path = "/matches/{id}/draw",
    tag = "events",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    request_body = DrawBatchRequest,
    responses(
        (status = 202, description = "Draw batch published"),
        (status = 400, description = "Batch exceeds the configured point cap"),
        (status = 409, description = "Caller is not the guesser of a live match")
    )
)]
pub async fn publish_draw(
    State(state): State<SharedState>,
    caller: PlayerIdentity,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<DrawBatchRequest>>,
) -> Result<StatusCode, AppError> {
    relay::publish_draw_batch(&state, &caller, id, payload).await?;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    get,
    path = "/matches/{id}/events",
    tag = "events",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses((status = 200, description = "Match topic stream", content_type = "text/event-stream", body = String))
)]
/// Stream the match topic (join notifications and draw traffic) to a peer.
pub async fn match_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let subscription = state.bus().subscribe(&bus_events::match_topic(id));
    info!(match_id = %id, "new match stream connection");
    sse_service::to_sse_stream(subscription)
}

#[utoipa::path(
    get,
    path = "/matches/{id}/prematch/events",
    tag = "events",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses((status = 200, description = "Pre-match topic stream", content_type = "text/event-stream", body = String))
)]
/// Stream the pre-match topic (ready handshake) to a peer.
pub async fn pre_match_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let subscription = state.bus().subscribe(&bus_events::pre_match_topic(id));
    info!(match_id = %id, "new pre-match stream connection");
    sse_service::to_sse_stream(subscription)
}
