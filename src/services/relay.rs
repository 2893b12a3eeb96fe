//! Live draw relay: guesser-produced batches streamed to the creator.

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::MatchStatus,
    dto::events::{DrawBatchEvent, DrawBatchRequest},
    dto::identity::PlayerIdentity,
    error::ServiceError,
    services::{bus_events, bus_events::EVENT_DRAW, match_service},
    state::{SharedState, TopicSubscription},
};

/// Validate and publish one draw batch on the match topic.
///
/// Only the assigned guesser of an `active` match produces drawing input; the
/// batch size cap bounds payloads defensively even though the producer paces
/// itself to human drawing speed. Publication itself is fire-and-forget.
pub async fn publish_draw_batch(
    state: &SharedState,
    caller: &PlayerIdentity,
    match_id: Uuid,
    request: DrawBatchRequest,
) -> Result<(), ServiceError> {
    if request.points.is_empty() {
        return Err(ServiceError::InvalidInput(
            "a draw batch must contain at least one point".into(),
        ));
    }
    let cap = state.config().max_points_per_batch;
    if request.points.len() > cap {
        return Err(ServiceError::InvalidInput(format!(
            "draw batch exceeds the {cap}-point cap"
        )));
    }

    let row = match_service::get_match(state, match_id).await?;
    if row.status != MatchStatus::Active {
        return Err(ServiceError::Conflict(format!(
            "match `{match_id}` is not live"
        )));
    }
    if row.guesser_id != Some(caller.id) {
        return Err(ServiceError::Conflict(
            "only the match guesser publishes draw input".into(),
        ));
    }

    let batch = DrawBatchEvent {
        captured_at_ms: request.captured_at_ms,
        points: request.points,
    };
    bus_events::publish_draw(state, match_id, &batch);
    Ok(())
}

/// Consumer end of the relay, yielding batches strictly in arrival order.
///
/// There is no reordering buffer and no replay: whatever order the bus hands
/// events over is the order the rendering surface applies them in.
pub struct DrawFeed {
    subscription: TopicSubscription,
}

impl DrawFeed {
    /// Subscribe to the draw traffic of `match_id`.
    pub fn open(state: &SharedState, match_id: Uuid) -> Self {
        Self {
            subscription: state.bus().subscribe(&bus_events::match_topic(match_id)),
        }
    }

    /// The next draw batch, or `None` once the topic is gone.
    ///
    /// Non-draw traffic on the match topic is skipped; malformed payloads are
    /// logged and dropped rather than poisoning the feed.
    pub async fn next(&mut self) -> Option<DrawBatchEvent> {
        loop {
            let event = self.subscription.recv().await?;
            if event.event != EVENT_DRAW {
                continue;
            }
            match serde_json::from_str::<DrawBatchEvent>(&event.data) {
                Ok(batch) => return Some(batch),
                Err(err) => {
                    warn!(topic = %self.subscription.topic(), error = %err, "malformed draw batch");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::{ClaimOutcome, MatchStore, memory::MemoryMatchStore},
        dao::models::MatchEntity,
        dto::events::PathPoint,
        state::AppState,
    };

    async fn active_match(store: &MemoryMatchStore) -> (MatchEntity, PlayerIdentity) {
        let entity = MatchEntity::new(Uuid::new_v4(), None, Some(Uuid::new_v4()));
        store.create_match(entity.clone()).await.unwrap();

        let guesser = PlayerIdentity {
            id: Uuid::new_v4(),
            name: Some("guesser".into()),
        };
        let claimed = match store
            .claim_match(entity.id, guesser.id, guesser.name.clone())
            .await
            .unwrap()
        {
            ClaimOutcome::Claimed(claimed) => claimed,
            other => panic!("claim should succeed, got {other:?}"),
        };
        (claimed, guesser)
    }

    async fn state_with_store() -> (SharedState, MemoryMatchStore) {
        let state = AppState::new(AppConfig {
            max_points_per_batch: 4,
            ..AppConfig::default()
        });
        let store = MemoryMatchStore::new();
        state.install_match_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn batch(seq: u64, len: usize) -> DrawBatchRequest {
        DrawBatchRequest {
            captured_at_ms: seq,
            points: (0..len)
                .map(|i| PathPoint {
                    x: i as f32,
                    y: seq as f32,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn batches_arrive_in_publication_order_without_loss() {
        let (state, store) = state_with_store().await;
        let (row, guesser) = active_match(&store).await;

        let mut feed = DrawFeed::open(&state, row.id);

        for seq in 0..10 {
            publish_draw_batch(&state, &guesser, row.id, batch(seq, 3))
                .await
                .unwrap();
        }

        for seq in 0..10 {
            let received = feed.next().await.unwrap();
            assert_eq!(received.captured_at_ms, seq);
            assert_eq!(received.points.len(), 3);
        }
    }

    #[tokio::test]
    async fn non_draw_traffic_on_the_topic_is_skipped() {
        let (state, store) = state_with_store().await;
        let (row, guesser) = active_match(&store).await;

        let mut feed = DrawFeed::open(&state, row.id);

        bus_events::publish_guesser_joined(&state, &row);
        publish_draw_batch(&state, &guesser, row.id, batch(7, 1))
            .await
            .unwrap();

        assert_eq!(feed.next().await.unwrap().captured_at_ms, 7);
    }

    #[tokio::test]
    async fn oversized_batches_are_rejected_before_publication() {
        let (state, store) = state_with_store().await;
        let (row, guesser) = active_match(&store).await;

        let err = publish_draw_batch(&state, &guesser, row.id, batch(0, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn only_the_assigned_guesser_may_publish() {
        let (state, store) = state_with_store().await;
        let (row, _guesser) = active_match(&store).await;

        let stranger = PlayerIdentity {
            id: Uuid::new_v4(),
            name: None,
        };
        let err = publish_draw_batch(&state, &stranger, row.id, batch(0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn the_relay_is_closed_outside_the_live_phase() {
        let (state, store) = state_with_store().await;
        let entity = MatchEntity::new(Uuid::new_v4(), None, Some(Uuid::new_v4()));
        store.create_match(entity.clone()).await.unwrap();

        let anyone = PlayerIdentity {
            id: Uuid::new_v4(),
            name: None,
        };
        let err = publish_draw_batch(&state, &anyone, entity.id, batch(0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
