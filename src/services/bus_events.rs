//! Topic and event catalog for the notification bus.

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::MatchEntity,
    dto::events::{DrawBatchEvent, GuesserJoinedEvent, ReadyEvent},
    state::{BusEvent, SharedState},
    state::session_machine::Role,
};

/// Event published on the match topic when a guesser wins the claim.
pub const EVENT_GUESSER_JOINED: &str = "guesser-joined";
/// Event published on the pre-match topic when a side confirms readiness.
pub const EVENT_READY: &str = "ready";
/// Event published on the match topic for each relayed draw batch.
pub const EVENT_DRAW: &str = "draw";

/// Topic carrying join notifications and draw traffic for one match.
pub fn match_topic(match_id: Uuid) -> String {
    format!("match-{match_id}")
}

/// Topic carrying the ready handshake for one match.
pub fn pre_match_topic(match_id: Uuid) -> String {
    format!("pre-match-{match_id}")
}

/// Notify the waiting creator that the claim succeeded.
///
/// Best-effort: the creator may equally discover the join by re-reading the
/// match row, so a dropped event costs latency, not correctness.
pub fn publish_guesser_joined(state: &SharedState, claimed: &MatchEntity) {
    let Some(guesser_id) = claimed.guesser_id else {
        return;
    };
    let payload = GuesserJoinedEvent {
        match_id: claimed.id,
        guesser_id,
        guesser_name: claimed.guesser_name.clone(),
    };
    send_event(state, &match_topic(claimed.id), EVENT_GUESSER_JOINED, &payload);
}

/// Publish a role-tagged ready confirmation on the pre-match topic.
pub fn publish_ready(state: &SharedState, match_id: Uuid, role: Role) {
    send_event(
        state,
        &pre_match_topic(match_id),
        EVENT_READY,
        &ReadyEvent { role },
    );
}

/// Publish one draw batch on the match topic.
pub fn publish_draw(state: &SharedState, match_id: Uuid, batch: &DrawBatchEvent) {
    send_event(state, &match_topic(match_id), EVENT_DRAW, batch);
}

fn send_event(state: &SharedState, topic: &str, event: &str, payload: &impl Serialize) {
    match BusEvent::json(event, payload) {
        Ok(event) => state.bus().publish(topic, event),
        Err(err) => warn!(topic, event, error = %err, "failed to serialize bus payload"),
    }
}
