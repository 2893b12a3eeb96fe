//! Match entities shared between the store backends and the service layer.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a match.
///
/// The status only ever moves forward along `creating → waiting → active →
/// finished`; `failed` is reachable from the two pre-active states only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Row exists but the challenge has not been attached yet; not offered to guessers.
    Creating,
    /// Ready for a guesser; eligible for `find_oldest_waiting`.
    Waiting,
    /// A guesser won the claim; both peers are (or are becoming) live.
    Active,
    /// The match never became active: expired or abandoned before a join.
    Failed,
    /// Match play concluded normally.
    Finished,
}

impl MatchStatus {
    /// Whether moving from `self` to `next` is legal under the monotonic status graph.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Creating, MatchStatus::Waiting)
                | (MatchStatus::Waiting, MatchStatus::Active)
                | (MatchStatus::Active, MatchStatus::Finished)
                | (MatchStatus::Creating, MatchStatus::Failed)
                | (MatchStatus::Waiting, MatchStatus::Failed)
        )
    }
}

/// Match record persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Primary key of the match.
    pub id: Uuid,
    /// Current lifecycle status.
    pub status: MatchStatus,
    /// Identity of the initiating participant; set at creation, never reassigned.
    pub creator_id: Uuid,
    /// Display label snapshotted when the creator opened the match.
    pub creator_name: Option<String>,
    /// Identity of the joining participant; set exactly once by the claim.
    pub guesser_id: Option<Uuid>,
    /// Display label snapshotted when the guesser joined.
    pub guesser_name: Option<String>,
    /// Opaque pointer to the shape/template attached to this match.
    pub challenge_id: Option<Uuid>,
    /// Creation timestamp; orders the waiting queue, oldest first.
    pub created_at: SystemTime,
    /// Last time this row was updated.
    pub updated_at: SystemTime,
}

impl MatchEntity {
    /// Build a fresh match row for the given creator.
    pub fn new(
        creator_id: Uuid,
        creator_name: Option<String>,
        challenge_id: Option<Uuid>,
    ) -> Self {
        let now = SystemTime::now();
        // A challenge attached up front means the match is immediately joinable.
        let status = if challenge_id.is_some() {
            MatchStatus::Waiting
        } else {
            MatchStatus::Creating
        };
        Self {
            id: Uuid::new_v4(),
            status,
            creator_id,
            creator_name,
            guesser_id: None,
            guesser_name: None,
            challenge_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the given caller is one of the two participants.
    pub fn has_participant(&self, player_id: Uuid) -> bool {
        self.creator_id == player_id || self.guesser_id == Some(player_id)
    }
}

/// Field subset accepted by `update_match`.
///
/// The guesser assignment is deliberately absent: it can only be written by
/// the atomic claim operation.
#[derive(Debug, Clone, Default)]
pub struct MatchUpdate {
    /// New status, validated against the transition graph by the backend.
    pub status: Option<MatchStatus>,
    /// Challenge reference to attach.
    pub challenge_id: Option<Uuid>,
}
