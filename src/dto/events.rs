//! Payloads carried over the notification bus topics.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::session_machine::Role;

/// Published on `match-{id}` right after a successful claim.
///
/// This is a performance hint for the waiting creator; correctness never
/// depends on its delivery, since the creator re-reads the match row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GuesserJoinedEvent {
    /// The claimed match.
    pub match_id: Uuid,
    /// Identity of the winning guesser.
    pub guesser_id: Uuid,
    /// Guesser display name snapshotted by the claim.
    pub guesser_name: Option<String>,
}

/// Published on `pre-match-{id}` when a participant confirms readiness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ReadyEvent {
    /// Role of the publishing side; each side reacts only to the other role.
    pub role: Role,
}

/// Request body for the ready endpoint.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReadyRequest {
    /// Role of the caller within the match.
    pub role: Role,
}

/// A single pointer position on the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PathPoint {
    /// Horizontal coordinate in canvas space.
    pub x: f32,
    /// Vertical coordinate in canvas space.
    pub y: f32,
}

/// A timestamped batch of path points relayed from guesser to creator.
///
/// Batches are consumed in arrival order and discarded; nothing is buffered or
/// replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DrawBatchEvent {
    /// Producer-side capture timestamp, milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
    /// Path points in stroke order.
    pub points: Vec<PathPoint>,
}

/// Request body for the draw endpoint.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DrawBatchRequest {
    /// Producer-side capture timestamp, milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
    /// Path points in stroke order. The configured per-batch cap is enforced
    /// by the relay on top of this coarse bound.
    #[validate(length(min = 1, max = 4096))]
    pub points: Vec<PathPoint>,
}
