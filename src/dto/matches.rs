//! Request and response types for the match boundary operations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{MatchEntity, MatchStatus},
    dto::format_system_time,
};

/// Payload used to open a brand-new match.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    /// Challenge to draw, as handed out by the template provider. A match
    /// created without one starts in `creating` and is not yet joinable.
    #[serde(default)]
    pub challenge_id: Option<Uuid>,
}

/// Payload used to move a match along its status graph.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateMatchStatusRequest {
    /// Requested status.
    pub status: MatchStatus,
    /// Challenge reference to attach alongside the status change, typically
    /// when flipping `creating` to `waiting`.
    #[serde(default)]
    pub challenge_id: Option<Uuid>,
}

/// Public projection of a match row.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchSummary {
    /// Match identifier.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Identity of the creator.
    pub creator_id: Uuid,
    /// Creator display name snapshotted at creation.
    pub creator_name: Option<String>,
    /// Identity of the guesser once one has claimed the match.
    pub guesser_id: Option<Uuid>,
    /// Guesser display name snapshotted at claim time.
    pub guesser_name: Option<String>,
    /// Attached challenge reference, if any.
    pub challenge_id: Option<Uuid>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-update timestamp.
    pub updated_at: String,
}

impl From<MatchEntity> for MatchSummary {
    fn from(entity: MatchEntity) -> Self {
        Self {
            id: entity.id,
            status: entity.status,
            creator_id: entity.creator_id,
            creator_name: entity.creator_name,
            guesser_id: entity.guesser_id,
            guesser_name: entity.guesser_name,
            challenge_id: entity.challenge_id,
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
        }
    }
}
