//! Caller identity supplied by the upstream identity provider.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Header carrying the authenticated player id.
pub const PLAYER_ID_HEADER: &str = "x-player-id";
/// Header carrying the player's display name, if any.
pub const PLAYER_NAME_HEADER: &str = "x-player-name";

/// Identity of the authenticated caller.
///
/// Authentication itself is an external collaborator; by the time a request
/// reaches this service the gateway has resolved the session and stamped these
/// headers. A request without them is rejected before any store access.
#[derive(Debug, Clone)]
pub struct PlayerIdentity {
    /// Stable player identifier.
    pub id: Uuid,
    /// Display label snapshotted onto matches this player participates in.
    pub name: Option<String>,
}

impl<S> FromRequestParts<S> for PlayerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = parts
            .headers
            .get(PLAYER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthenticated(format!("missing `{PLAYER_ID_HEADER}` header"))
            })?;

        let id = raw_id.parse::<Uuid>().map_err(|_| {
            AppError::Unauthenticated(format!("malformed `{PLAYER_ID_HEADER}` header"))
        })?;

        let name = parts
            .headers
            .get(PLAYER_NAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .filter(|name| !name.trim().is_empty());

        Ok(Self { id, name })
    }
}
