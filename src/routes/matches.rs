//! The five match boundary actions.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::identity::PlayerIdentity,
    dto::matches::{CreateMatchRequest, MatchSummary, UpdateMatchStatusRequest},
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Routes handling the match lifecycle boundary.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", post(create_match))
        .route("/matches/join", post(join_match))
        .route("/matches/{id}", get(get_match).delete(delete_match))
        .route("/matches/{id}/status", post(update_match_status))
}

/// Open a new match for the calling creator.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "match",
    request_body = CreateMatchRequest,
    responses(
        (status = 200, description = "Match created", body = MatchSummary),
        (status = 401, description = "Missing caller identity")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    caller: PlayerIdentity,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = match_service::create_match(&state, &caller, payload).await?;
    Ok(Json(entity.into()))
}

/// Run one join arbitration attempt against the waiting queue.
#[utoipa::path(
    post,
    path = "/matches/join",
    tag = "match",
    responses(
        (status = 200, description = "Claim won; the match is active", body = MatchSummary),
        (status = 404, description = "No waiting match available right now"),
        (status = 409, description = "Another guesser claimed the match first")
    )
)]
pub async fn join_match(
    State(state): State<SharedState>,
    caller: PlayerIdentity,
) -> Result<Json<MatchSummary>, AppError> {
    let claimed = match_service::join_match(&state, &caller).await?;
    Ok(Json(claimed.into()))
}

/// Fetch a match row by id.
#[utoipa::path(
    get,
    path = "/matches/{id}",
    tag = "match",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Match found", body = MatchSummary),
        (status = 404, description = "Unknown match id")
    )
)]
pub async fn get_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = match_service::get_match(&state, id).await?;
    Ok(Json(entity.into()))
}

/// Move a match along its status graph.
#[utoipa::path(
    post,
    path = "/matches/{id}/status",
    tag = "match",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    request_body = UpdateMatchStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MatchSummary),
        (status = 404, description = "Unknown match id"),
        (status = 409, description = "The requested transition is illegal")
    )
)]
pub async fn update_match_status(
    State(state): State<SharedState>,
    caller: PlayerIdentity,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateMatchStatusRequest>>,
) -> Result<Json<MatchSummary>, AppError> {
    let entity = match_service::update_match_status(&state, &caller, id, payload).await?;
    Ok(Json(entity.into()))
}

/// Delete a match row; creator only.
#[utoipa::path(
    delete,
    path = "/matches/{id}",
    tag = "match",
    params(("id" = Uuid, Path, description = "Identifier of the match")),
    responses(
        (status = 204, description = "Match deleted"),
        (status = 404, description = "Unknown match id")
    )
)]
pub async fn delete_match(
    State(state): State<SharedState>,
    caller: PlayerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    match_service::delete_match(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
