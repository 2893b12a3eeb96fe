//! Match boundary operations: create, read, join, update, delete.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        match_store::{ClaimOutcome, UpdateOutcome},
        models::{MatchEntity, MatchStatus, MatchUpdate},
    },
    dto::{identity::PlayerIdentity, matches::{CreateMatchRequest, UpdateMatchStatusRequest}},
    error::ServiceError,
    services::bus_events,
    state::SharedState,
};

/// Open a new match on behalf of the caller.
///
/// With a challenge attached the row starts at `waiting` and is immediately
/// claimable; without one it starts at `creating` until the template provider
/// delivers a challenge.
pub async fn create_match(
    state: &SharedState,
    caller: &PlayerIdentity,
    request: CreateMatchRequest,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;

    let entity = MatchEntity::new(caller.id, caller.name.clone(), request.challenge_id);
    store.create_match(entity.clone()).await?;

    info!(match_id = %entity.id, status = ?entity.status, "match created");
    Ok(entity)
}

/// Read a match row by id.
pub async fn get_match(state: &SharedState, id: Uuid) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    store
        .find_match(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))
}

/// One join arbitration attempt: find the oldest waiting match and claim it.
///
/// `NotFound` means nothing is waiting right now; `Conflict` means another
/// guesser won the race on the row we saw. Both are expected outcomes that the
/// search loop handles locally.
pub async fn join_match(
    state: &SharedState,
    caller: &PlayerIdentity,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;

    let Some(candidate) = store.find_oldest_waiting(Some(caller.id)).await? else {
        return Err(ServiceError::NotFound("no waiting match available".into()));
    };

    match store
        .claim_match(candidate.id, caller.id, caller.name.clone())
        .await?
    {
        ClaimOutcome::Claimed(claimed) => {
            info!(match_id = %claimed.id, guesser_id = %caller.id, "claim won");
            // Wake the waiting creator without making them poll the store.
            bus_events::publish_guesser_joined(state, &claimed);
            Ok(claimed)
        }
        ClaimOutcome::Unavailable => {
            debug!(match_id = %candidate.id, "claim lost; match no longer available");
            Err(ServiceError::Conflict(format!(
                "match `{}` is no longer available",
                candidate.id
            )))
        }
    }
}

/// Move a match along its status graph, optionally attaching a challenge.
///
/// Only participants may mutate a match; everyone else learns nothing beyond
/// `not_found`. Illegal transitions surface as `Conflict`.
pub async fn update_match_status(
    state: &SharedState,
    caller: &PlayerIdentity,
    id: Uuid,
    request: UpdateMatchStatusRequest,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;

    let current = store
        .find_match(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;
    if !current.has_participant(caller.id) {
        return Err(ServiceError::NotFound(format!("match `{id}` not found")));
    }

    let update = MatchUpdate {
        status: Some(request.status),
        challenge_id: request.challenge_id,
    };
    apply_update(state, id, update).await
}

/// Mark a match `failed` after its waiting room expired.
///
/// Runs through the same transition-guarded write as every other status
/// change, so a concurrently won claim turns this into a `Conflict` instead of
/// regressing an `active` row.
pub async fn mark_failed(state: &SharedState, id: Uuid) -> Result<MatchEntity, ServiceError> {
    let update = MatchUpdate {
        status: Some(MatchStatus::Failed),
        ..Default::default()
    };
    apply_update(state, id, update).await
}

/// Delete a match row. Creator only.
pub async fn delete_match(
    state: &SharedState,
    caller: &PlayerIdentity,
    id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_match_store().await?;

    let current = store
        .find_match(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}` not found")))?;
    if current.creator_id != caller.id {
        return Err(ServiceError::NotFound(format!("match `{id}` not found")));
    }

    store.delete_match(id).await?;
    info!(match_id = %id, "match deleted");
    Ok(())
}

async fn apply_update(
    state: &SharedState,
    id: Uuid,
    update: MatchUpdate,
) -> Result<MatchEntity, ServiceError> {
    let store = state.require_match_store().await?;
    match store.update_match(id, update).await? {
        UpdateOutcome::Updated(entity) => Ok(entity),
        UpdateOutcome::NotFound => {
            Err(ServiceError::NotFound(format!("match `{id}` not found")))
        }
        UpdateOutcome::InvalidTransition { from, to } => Err(ServiceError::Conflict(format!(
            "match `{id}` cannot move from {from:?} to {to:?}"
        ))),
    }
}
