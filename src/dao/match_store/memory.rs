//! In-process match store used as the default backend and in tests.

use std::time::SystemTime;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    match_store::{ClaimOutcome, MatchStore, UpdateOutcome},
    models::{MatchEntity, MatchStatus, MatchUpdate},
    storage::StorageResult,
};

/// Match store backed by a concurrent in-memory map.
///
/// Mutating operations run while holding the map's per-entry exclusive guard,
/// which makes the claim's conditional check-and-set a single indivisible step
/// against concurrent callers.
#[derive(Clone, Default)]
pub struct MemoryMatchStore {
    matches: std::sync::Arc<DashMap<Uuid, MatchEntity>>,
}

impl MemoryMatchStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(&self, id: Uuid, guesser_id: Uuid, guesser_name: Option<String>) -> ClaimOutcome {
        let Some(mut entry) = self.matches.get_mut(&id) else {
            return ClaimOutcome::Unavailable;
        };

        if entry.status != MatchStatus::Waiting || entry.guesser_id.is_some() {
            return ClaimOutcome::Unavailable;
        }

        entry.status = MatchStatus::Active;
        entry.guesser_id = Some(guesser_id);
        entry.guesser_name = guesser_name;
        entry.updated_at = SystemTime::now();
        ClaimOutcome::Claimed(entry.value().clone())
    }

    fn update(&self, id: Uuid, update: MatchUpdate) -> UpdateOutcome {
        let Some(mut entry) = self.matches.get_mut(&id) else {
            return UpdateOutcome::NotFound;
        };

        if let Some(next) = update.status {
            if !entry.status.can_transition_to(next) {
                return UpdateOutcome::InvalidTransition {
                    from: entry.status,
                    to: next,
                };
            }
            entry.status = next;
        }
        if let Some(challenge_id) = update.challenge_id {
            entry.challenge_id = Some(challenge_id);
        }
        entry.updated_at = SystemTime::now();
        UpdateOutcome::Updated(entry.value().clone())
    }

    fn oldest_waiting(&self, exclude_creator: Option<Uuid>) -> Option<MatchEntity> {
        self.matches
            .iter()
            .filter(|entry| {
                entry.status == MatchStatus::Waiting
                    && entry.guesser_id.is_none()
                    && exclude_creator != Some(entry.creator_id)
            })
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.value().clone())
    }
}

impl MatchStore for MemoryMatchStore {
    fn create_match(&self, entity: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.matches.insert(entity.id, entity);
            Ok(())
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.matches.get(&id).map(|entry| entry.value().clone())) })
    }

    fn update_match(
        &self,
        id: Uuid,
        update: MatchUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.update(id, update)) })
    }

    fn delete_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.matches.remove(&id).is_some()) })
    }

    fn find_oldest_waiting(
        &self,
        exclude_creator: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.oldest_waiting(exclude_creator)) })
    }

    fn claim_match(
        &self,
        id: Uuid,
        guesser_id: Uuid,
        guesser_name: Option<String>,
    ) -> BoxFuture<'static, StorageResult<ClaimOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.claim(id, guesser_id, guesser_name)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn waiting_match(creator: Uuid) -> MatchEntity {
        MatchEntity::new(creator, Some("creator".into()), Some(Uuid::new_v4()))
    }

    #[tokio::test]
    async fn concurrent_claims_have_exactly_one_winner() {
        let store = MemoryMatchStore::new();
        let entity = waiting_match(Uuid::new_v4());
        let id = entity.id;
        store.create_match(entity).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_match(id, Uuid::new_v4(), None).await.unwrap()
            }));
        }

        let mut winners = 0;
        let mut losers = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ClaimOutcome::Claimed(m) => {
                    winners += 1;
                    assert_eq!(m.status, MatchStatus::Active);
                    assert!(m.guesser_id.is_some());
                }
                ClaimOutcome::Unavailable => losers += 1,
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(losers, 7);

        let row = store.find_match(id).await.unwrap().unwrap();
        assert_eq!(row.status, MatchStatus::Active);
        assert!(row.guesser_id.is_some());
    }

    #[tokio::test]
    async fn oldest_waiting_orders_by_creation_and_excludes_caller() {
        let store = MemoryMatchStore::new();
        let me = Uuid::new_v4();

        let mut oldest = waiting_match(me);
        oldest.created_at = SystemTime::UNIX_EPOCH;
        let mut second = waiting_match(Uuid::new_v4());
        second.created_at = SystemTime::UNIX_EPOCH + Duration::from_secs(1);
        let mut third = waiting_match(Uuid::new_v4());
        third.created_at = SystemTime::UNIX_EPOCH + Duration::from_secs(2);

        let second_id = second.id;
        store.create_match(third).await.unwrap();
        store.create_match(oldest).await.unwrap();
        store.create_match(second).await.unwrap();

        // The absolute oldest row belongs to the caller, so the next one wins.
        let found = store.find_oldest_waiting(Some(me)).await.unwrap().unwrap();
        assert_eq!(found.id, second_id);
    }

    #[tokio::test]
    async fn claimed_failed_and_deleted_matches_are_never_offered() {
        let store = MemoryMatchStore::new();

        let claimed = waiting_match(Uuid::new_v4());
        let claimed_id = claimed.id;
        let failed = waiting_match(Uuid::new_v4());
        let failed_id = failed.id;
        let deleted = waiting_match(Uuid::new_v4());
        let deleted_id = deleted.id;

        store.create_match(claimed).await.unwrap();
        store.create_match(failed).await.unwrap();
        store.create_match(deleted).await.unwrap();

        store
            .claim_match(claimed_id, Uuid::new_v4(), None)
            .await
            .unwrap();
        store
            .update_match(
                failed_id,
                MatchUpdate {
                    status: Some(MatchStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(store.delete_match(deleted_id).await.unwrap());

        assert_eq!(store.find_oldest_waiting(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn creating_matches_are_not_claimable() {
        let store = MemoryMatchStore::new();
        let entity = MatchEntity::new(Uuid::new_v4(), None, None);
        let id = entity.id;
        store.create_match(entity).await.unwrap();

        assert_eq!(
            store.claim_match(id, Uuid::new_v4(), None).await.unwrap(),
            ClaimOutcome::Unavailable
        );
        assert_eq!(store.find_oldest_waiting(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_rejects_illegal_status_writes() {
        let store = MemoryMatchStore::new();
        let entity = waiting_match(Uuid::new_v4());
        let id = entity.id;
        store.create_match(entity).await.unwrap();

        store.claim_match(id, Uuid::new_v4(), None).await.unwrap();

        // An expiry timer firing after the claim must not regress the row.
        let outcome = store
            .update_match(
                id,
                MatchUpdate {
                    status: Some(MatchStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::InvalidTransition {
                from: MatchStatus::Active,
                to: MatchStatus::Failed,
            }
        );

        let row = store.find_match(id).await.unwrap().unwrap();
        assert_eq!(row.status, MatchStatus::Active);
    }

    #[tokio::test]
    async fn attaching_a_challenge_moves_creating_to_waiting() {
        let store = MemoryMatchStore::new();
        let entity = MatchEntity::new(Uuid::new_v4(), None, None);
        let id = entity.id;
        store.create_match(entity).await.unwrap();

        let outcome = store
            .update_match(
                id,
                MatchUpdate {
                    status: Some(MatchStatus::Waiting),
                    challenge_id: Some(Uuid::new_v4()),
                },
            )
            .await
            .unwrap();

        match outcome {
            UpdateOutcome::Updated(row) => {
                assert_eq!(row.status, MatchStatus::Waiting);
                assert!(row.challenge_id.is_some());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
