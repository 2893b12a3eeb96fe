//! Guesser-side search loop over the waiting queue.

use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::{
    dao::models::MatchEntity,
    dto::identity::PlayerIdentity,
    error::ServiceError,
    services::match_service,
    state::SharedState,
};

/// Backoff applied after a transient store failure before the next attempt.
const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Poll the waiting queue until a match is claimed or the search window lapses.
///
/// A `find_oldest_waiting` miss is the expected "nothing available yet" case
/// and waits out one (jittered) poll interval. A lost claim re-searches
/// immediately, because another waiting match may already be there. Transient
/// store failures back off briefly and stay bounded by the same window.
pub async fn search(
    state: &SharedState,
    caller: &PlayerIdentity,
) -> Result<MatchEntity, ServiceError> {
    let config = state.config();
    let deadline = Instant::now() + config.search_window;

    loop {
        match match_service::join_match(state, caller).await {
            Ok(claimed) => return Ok(claimed),
            Err(ServiceError::NotFound(_)) => {
                let delay = jittered(config.poll_interval, config.poll_jitter);
                if Instant::now() + delay >= deadline {
                    debug!(player_id = %caller.id, "search window exhausted");
                    return Err(ServiceError::Timeout);
                }
                sleep(delay).await;
            }
            Err(ServiceError::Conflict(_)) => {
                // Someone else won that row; re-search right away rather than
                // waiting out a full poll interval.
                if Instant::now() >= deadline {
                    return Err(ServiceError::Timeout);
                }
            }
            Err(err @ (ServiceError::Unavailable(_) | ServiceError::Degraded)) => {
                if Instant::now() + TRANSIENT_RETRY_DELAY >= deadline {
                    return Err(ServiceError::Timeout);
                }
                warn!(error = %err, "store unavailable during search; backing off");
                sleep(TRANSIENT_RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// The poll interval plus a uniformly random slice of the configured jitter,
/// so competing guessers do not hammer the queue in lockstep.
fn jittered(interval: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return interval;
    }
    let extra = rand::rng().random_range(0..=jitter.as_millis() as u64);
    interval + Duration::from_millis(extra)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::{MatchStore, memory::MemoryMatchStore},
        dao::models::{MatchEntity, MatchStatus},
        state::AppState,
    };

    fn fast_config() -> AppConfig {
        AppConfig {
            poll_interval: Duration::from_millis(10),
            poll_jitter: Duration::ZERO,
            search_window: Duration::from_millis(200),
            ..AppConfig::default()
        }
    }

    fn identity(name: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
        }
    }

    async fn state_with_store() -> (crate::state::SharedState, MemoryMatchStore) {
        let state = AppState::new(fast_config());
        let store = MemoryMatchStore::new();
        state.install_match_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn search_claims_a_match_created_mid_window() {
        let (state, store) = state_with_store().await;
        let guesser = identity("guesser");

        let searcher = {
            let state = state.clone();
            let guesser = guesser.clone();
            tokio::spawn(async move { search(&state, &guesser).await })
        };

        // Let the first poll miss, then make a match appear.
        sleep(Duration::from_millis(30)).await;
        let entity = MatchEntity::new(Uuid::new_v4(), None, Some(Uuid::new_v4()));
        store.create_match(entity.clone()).await.unwrap();

        let claimed = searcher.await.unwrap().unwrap();
        assert_eq!(claimed.id, entity.id);
        assert_eq!(claimed.status, MatchStatus::Active);
        assert_eq!(claimed.guesser_id, Some(guesser.id));
    }

    #[tokio::test]
    async fn search_never_claims_the_callers_own_match() {
        let (state, store) = state_with_store().await;
        let creator = identity("creator");

        let own = MatchEntity::new(creator.id, creator.name.clone(), Some(Uuid::new_v4()));
        store.create_match(own).await.unwrap();

        assert!(matches!(
            search(&state, &creator).await,
            Err(ServiceError::Timeout)
        ));
    }

    #[tokio::test]
    async fn search_times_out_when_nothing_appears() {
        let (state, _store) = state_with_store().await;
        let started = Instant::now();

        assert!(matches!(
            search(&state, &identity("guesser")).await,
            Err(ServiceError::Timeout)
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn two_concurrent_searchers_split_win_and_timeout() {
        let (state, store) = state_with_store().await;

        let entity = MatchEntity::new(Uuid::new_v4(), None, Some(Uuid::new_v4()));
        store.create_match(entity).await.unwrap();

        let first = {
            let state = state.clone();
            tokio::spawn(async move { search(&state, &identity("a")).await })
        };
        let second = {
            let state = state.clone();
            tokio::spawn(async move { search(&state, &identity("b")).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let timeouts = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Timeout)))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(timeouts, 1);
    }
}
