//! Store abstraction for match rows, including the atomic claim primitive.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{MatchEntity, MatchStatus, MatchUpdate};
use crate::dao::storage::StorageResult;

/// Outcome of the atomic claim operation.
///
/// Exactly one of N concurrent claimants of a waiting match receives
/// [`ClaimOutcome::Claimed`]; every other caller receives a definitive
/// [`ClaimOutcome::Unavailable`], never a partial or ambiguous result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller won the race; the returned row is already `active` with the
    /// guesser assigned.
    Claimed(MatchEntity),
    /// The match is not claimable: unknown, no longer waiting, or already
    /// assigned to another guesser.
    Unavailable,
}

/// Outcome of a guarded `update_match`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The row was updated; the returned entity reflects the new state.
    Updated(MatchEntity),
    /// No row with that id exists.
    NotFound,
    /// The requested status write violates the monotonic status graph.
    InvalidTransition {
        /// Status the row currently holds.
        from: MatchStatus,
        /// Status the caller asked for.
        to: MatchStatus,
    },
}

/// Abstraction over the persistence layer for match rows.
///
/// `claim_match` is the only operation that assigns a guesser, and backends
/// must execute its conditional check-and-set as a single indivisible step
/// against concurrent callers.
pub trait MatchStore: Send + Sync {
    /// Insert a freshly built match row.
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Read a match row by id.
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Apply a field subset, validating any status change against the graph.
    fn update_match(
        &self,
        id: Uuid,
        update: MatchUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>>;
    /// Delete a match row; returns whether a row was removed.
    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// The oldest `waiting` match not created by `exclude_creator`, if any.
    fn find_oldest_waiting(
        &self,
        exclude_creator: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Atomically assign `guesser_id` and flip the status to `active`, iff the
    /// row is still `waiting` with no guesser.
    fn claim_match(
        &self,
        id: Uuid,
        guesser_id: Uuid,
        guesser_name: Option<String>,
    ) -> BoxFuture<'static, StorageResult<ClaimOutcome>>;
    /// Probe backend connectivity.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
