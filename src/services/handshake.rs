//! Pre-match ready handshake between the two peers.

use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::events::ReadyEvent,
    error::ServiceError,
    services::bus_events::{self, EVENT_READY},
    state::{SharedState, TopicSubscription},
    state::session_machine::{Role, SessionEvent, SessionMachine, SessionPhase},
};

/// One session's side of the pre-match rendezvous.
///
/// The handshake is level-triggered: the session machine re-evaluates the
/// local/peer conjunction on every relevant event, so the transition to live
/// does not depend on which side's `ready` arrives first. The bus does not
/// persist events, so a `ready` published before the peer subscribed is lost;
/// this runner re-publishes its own readiness whenever it first observes the
/// peer's, which lets the late subscriber catch up.
pub struct ReadyHandshake {
    state: SharedState,
    match_id: Uuid,
    machine: SessionMachine,
    subscription: TopicSubscription,
}

impl ReadyHandshake {
    /// Enter the handshake for `match_id` as `role`.
    ///
    /// Subscribes to the pre-match topic before anything is published, so no
    /// event after this call can be missed.
    pub fn begin(state: &SharedState, match_id: Uuid, role: Role) -> Self {
        let subscription = state
            .bus()
            .subscribe(&bus_events::pre_match_topic(match_id));

        Self {
            state: state.clone(),
            match_id,
            machine: SessionMachine::handshake(role),
            subscription,
        }
    }

    /// Flip the local flag and announce it on the pre-match topic.
    pub fn mark_local_ready(&mut self) -> Result<(), ServiceError> {
        self.machine
            .apply(SessionEvent::LocalReady)
            .map_err(|err| ServiceError::Conflict(err.to_string()))?;
        bus_events::publish_ready(&self.state, self.match_id, self.machine.role());
        Ok(())
    }

    /// Wait until both sides are ready, bounded by the handshake window.
    ///
    /// Returns the machine in its `Live` phase on success.
    pub async fn await_synchronized(mut self) -> Result<SessionMachine, ServiceError> {
        let deadline = Instant::now() + self.state.config().handshake_window;

        loop {
            if self.machine.is_live() {
                return Ok(self.machine);
            }

            let signal = tokio::select! {
                _ = sleep_until(deadline) => None,
                maybe = self.subscription.recv() => maybe,
            };

            match signal {
                Some(event) if event.event == EVENT_READY => self.on_ready_event(&event.data),
                // Unrelated traffic; keep waiting for the peer.
                Some(_) => {}
                // Window lapsed, or the topic went away with the peer.
                None => {
                    sleep_until(deadline).await;
                    let _ = self.machine.apply(SessionEvent::TimedOut);
                    debug!(match_id = %self.match_id, role = ?self.machine.role(), "handshake window lapsed");
                    return Err(ServiceError::Timeout);
                }
            }
        }
    }

    fn on_ready_event(&mut self, data: &str) {
        let payload: ReadyEvent = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(match_id = %self.match_id, error = %err, "malformed ready event");
                return;
            }
        };

        // Our own publications also land on this subscription; only the other
        // role's events matter.
        if payload.role == self.machine.role() {
            return;
        }

        let peer_was_known = matches!(
            self.machine.phase(),
            SessionPhase::Handshake(flags) if flags.peer_ready
        );
        let locally_ready = matches!(
            self.machine.phase(),
            SessionPhase::Handshake(flags) if flags.local_ready
        ) || self.machine.is_live();

        if self.machine.apply(SessionEvent::PeerReady).is_err() {
            return;
        }

        // First sight of the peer: re-announce our own readiness in case our
        // earlier publish predated their subscription.
        if !peer_was_known && locally_ready {
            bus_events::publish_ready(&self.state, self.match_id, self.machine.role());
        }
    }
}
