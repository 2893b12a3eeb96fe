//! Creator-side waiting room: join discovery, expiry, abandon cleanup.

use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{MatchEntity, MatchStatus},
    error::ServiceError,
    services::bus_events::{self, EVENT_GUESSER_JOINED},
    state::{SharedState, TopicSubscription},
};

/// A creator session parked on its freshly created match.
///
/// The `guesser-joined` notification is a latency optimization only; the
/// store is re-read on every signal (and once up front) so a missed event
/// never strands the creator. Dropping a still-waiting room issues a
/// best-effort delete so abandoned rows are not offered to future searchers.
pub struct WaitingRoom {
    state: SharedState,
    match_id: Uuid,
    subscription: TopicSubscription,
    guard: AbandonGuard,
}

impl WaitingRoom {
    /// Park on `match_id`, subscribing to its topic before any store read so
    /// a join happening right now cannot slip between the two.
    pub fn open(state: &SharedState, match_id: Uuid) -> Self {
        let subscription = state.bus().subscribe(&bus_events::match_topic(match_id));
        Self {
            state: state.clone(),
            match_id,
            subscription,
            guard: AbandonGuard {
                state: state.clone(),
                match_id,
                armed: true,
            },
        }
    }

    /// Wait until a guesser joins or the waiting-room window lapses.
    ///
    /// On a join the now-`active` row is returned and the abandon guard is
    /// disarmed. On expiry the row is flipped to `failed` through the
    /// transition-guarded update; if that write reports the row already
    /// `active`, a claim won the race at the wire and the join is honored.
    pub async fn await_guesser(mut self) -> Result<MatchEntity, ServiceError> {
        let deadline = Instant::now() + self.state.config().waiting_room_window;

        // The claim may predate our subscription; the store is authoritative.
        if let Some(joined) = self.read_if_active().await? {
            self.guard.disarm();
            return Ok(joined);
        }

        loop {
            let signal = tokio::select! {
                _ = sleep_until(deadline) => None,
                maybe = self.subscription.recv() => maybe,
            };

            match signal {
                Some(event) if event.event == EVENT_GUESSER_JOINED => {
                    if let Some(joined) = self.read_if_active().await? {
                        debug!(match_id = %self.match_id, "guesser joined");
                        self.guard.disarm();
                        return Ok(joined);
                    }
                }
                // Unrelated traffic on the topic; keep waiting.
                Some(_) => {}
                // Window lapsed, or the topic went away: resolve via the store.
                None => {
                    sleep_until(deadline).await;
                    break;
                }
            }
        }

        self.expire().await
    }

    /// Tear the room down explicitly, deleting the row if still unclaimed.
    pub fn abandon(self) {
        info!(match_id = %self.match_id, "waiting room abandoned");
        // The guard's drop handler performs the delete.
    }

    async fn read_if_active(&self) -> Result<Option<MatchEntity>, ServiceError> {
        let store = self.state.require_match_store().await?;
        let row = store.find_match(self.match_id).await?;
        Ok(row.filter(|row| row.status == MatchStatus::Active))
    }

    async fn expire(mut self) -> Result<MatchEntity, ServiceError> {
        match crate::services::match_service::mark_failed(&self.state, self.match_id).await {
            Ok(_) => {
                info!(match_id = %self.match_id, "waiting room expired; match failed");
                // The row is resolved; nothing left for the guard to clean up.
                self.guard.disarm();
                Err(ServiceError::Timeout)
            }
            Err(ServiceError::Conflict(_)) => {
                // The claim beat the timer; the join stands.
                self.guard.disarm();
                self.read_if_active()
                    .await?
                    .ok_or(ServiceError::Timeout)
            }
            Err(err) => Err(err),
        }
    }
}

/// Fire-and-forget cleanup for a waiting row whose session went away.
struct AbandonGuard {
    state: SharedState,
    match_id: Uuid,
    armed: bool,
}

impl AbandonGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let state = self.state.clone();
        let match_id = self.match_id;
        // The session is tearing down; the delete must still be attempted,
        // and its failure is logged, not retried.
        tokio::spawn(async move {
            let Some(store) = state.match_store().await else {
                warn!(match_id = %match_id, "abandon cleanup skipped: store unavailable");
                return;
            };
            if let Err(err) = store.delete_match(match_id).await {
                warn!(match_id = %match_id, error = %err, "abandon cleanup failed");
            }
        });
    }
}
