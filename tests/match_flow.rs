//! End-to-end match lifecycle runs over the in-memory store and bus.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use draw_duel_back::{
    config::AppConfig,
    dao::match_store::{MatchStore, memory::MemoryMatchStore},
    dao::models::MatchStatus,
    dto::events::{DrawBatchRequest, PathPoint},
    dto::identity::PlayerIdentity,
    dto::matches::{CreateMatchRequest, UpdateMatchStatusRequest},
    error::ServiceError,
    services::{handshake::ReadyHandshake, match_service, matchmaking, relay, waiting_room::WaitingRoom},
    services::relay::DrawFeed,
    state::{AppState, SharedState},
    state::session_machine::Role,
};

fn fast_config() -> AppConfig {
    AppConfig {
        poll_interval: Duration::from_millis(10),
        poll_jitter: Duration::ZERO,
        search_window: Duration::from_millis(500),
        waiting_room_window: Duration::from_millis(500),
        handshake_window: Duration::from_millis(500),
        max_points_per_batch: 16,
        bus_capacity: 64,
    }
}

async fn state_with_store() -> (SharedState, MemoryMatchStore) {
    let state = AppState::new(fast_config());
    let store = MemoryMatchStore::new();
    state.install_match_store(Arc::new(store.clone())).await;
    (state, store)
}

fn player(name: &str) -> PlayerIdentity {
    PlayerIdentity {
        id: Uuid::new_v4(),
        name: Some(name.to_string()),
    }
}

fn batch(seq: u64) -> DrawBatchRequest {
    DrawBatchRequest {
        captured_at_ms: seq,
        points: vec![
            PathPoint {
                x: seq as f32,
                y: 0.0,
            },
            PathPoint {
                x: seq as f32,
                y: 1.0,
            },
        ],
    }
}

/// Two sessions run a complete match: create, search and claim, handshake,
/// draw relay, conclusion.
#[tokio::test]
async fn full_match_runs_to_completion() {
    let (state, store) = state_with_store().await;
    let creator = player("ada");
    let guesser = player("grace");

    let created = match_service::create_match(
        &state,
        &creator,
        CreateMatchRequest {
            challenge_id: Some(Uuid::new_v4()),
        },
    )
    .await
    .unwrap();
    assert_eq!(created.status, MatchStatus::Waiting);
    let match_id = created.id;

    let creator_session = {
        let state = state.clone();
        let creator = creator.clone();
        tokio::spawn(async move {
            let room = WaitingRoom::open(&state, match_id);
            let joined = room.await_guesser().await.unwrap();
            assert_eq!(joined.status, MatchStatus::Active);

            // Subscribe to the draw traffic before going live so no batch can
            // slip past between the handshake and the first read.
            let mut feed = DrawFeed::open(&state, match_id);

            let mut handshake = ReadyHandshake::begin(&state, match_id, Role::Creator);
            handshake.mark_local_ready().unwrap();
            let machine = handshake.await_synchronized().await.unwrap();
            assert!(machine.is_live());

            let mut received = Vec::new();
            for _ in 0..3 {
                received.push(feed.next().await.unwrap());
            }
            assert_eq!(
                received.iter().map(|b| b.captured_at_ms).collect::<Vec<_>>(),
                vec![0, 1, 2]
            );

            match_service::update_match_status(
                &state,
                &creator,
                match_id,
                UpdateMatchStatusRequest {
                    status: MatchStatus::Finished,
                    challenge_id: None,
                },
            )
            .await
            .unwrap();
        })
    };

    let guesser_session = {
        let state = state.clone();
        let guesser = guesser.clone();
        tokio::spawn(async move {
            let claimed = matchmaking::search(&state, &guesser).await.unwrap();
            assert_eq!(claimed.id, match_id);
            assert_eq!(claimed.guesser_id, Some(guesser.id));

            let mut handshake = ReadyHandshake::begin(&state, match_id, Role::Guesser);
            handshake.mark_local_ready().unwrap();
            handshake.await_synchronized().await.unwrap();

            for seq in 0..3 {
                relay::publish_draw_batch(&state, &guesser, match_id, batch(seq))
                    .await
                    .unwrap();
            }
        })
    };

    creator_session.await.unwrap();
    guesser_session.await.unwrap();

    let row = store.find_match(match_id).await.unwrap().unwrap();
    assert_eq!(row.status, MatchStatus::Finished);
    assert_eq!(row.guesser_name.as_deref(), Some("grace"));
}

/// Two guessers race for the same waiting match; exactly one wins, the loser
/// finds nothing on immediate retry and keeps polling until its window lapses.
#[tokio::test]
async fn concurrent_joins_produce_a_single_winner() {
    let (state, store) = state_with_store().await;
    let creator = player("ada");

    match_service::create_match(
        &state,
        &creator,
        CreateMatchRequest {
            challenge_id: Some(Uuid::new_v4()),
        },
    )
    .await
    .unwrap();

    let first = player("grace");
    let second = player("edsger");

    let (a, b) = tokio::join!(
        match_service::join_match(&state, &first),
        match_service::join_match(&state, &second)
    );

    let (claimed, winner, loser, loser_err) = match (a, b) {
        (Ok(claimed), Err(err)) => (claimed, &first, &second, err),
        (Err(err), Ok(claimed)) => (claimed, &second, &first, err),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert!(matches!(
        loser_err,
        ServiceError::Conflict(_) | ServiceError::NotFound(_)
    ));

    let offered = store.find_oldest_waiting(None).await.unwrap();
    assert_eq!(offered, None, "the claimed match must not be offered again");

    // The loser retries immediately and finds nothing waiting.
    assert!(matches!(
        match_service::join_match(&state, loser).await,
        Err(ServiceError::NotFound(_))
    ));

    let row = store.find_match(claimed.id).await.unwrap().unwrap();
    assert_eq!(row.status, MatchStatus::Active);
    assert_eq!(row.guesser_id, Some(winner.id));
}

/// A creator waits out the whole window with no join: the match fails and is
/// never offered to later searchers.
#[tokio::test]
async fn unjoined_matches_expire_and_disappear_from_the_queue() {
    let (state, store) = state_with_store().await;
    let creator = player("ada");

    let created = match_service::create_match(
        &state,
        &creator,
        CreateMatchRequest {
            challenge_id: Some(Uuid::new_v4()),
        },
    )
    .await
    .unwrap();

    let room = WaitingRoom::open(&state, created.id);
    assert!(matches!(
        room.await_guesser().await,
        Err(ServiceError::Timeout)
    ));

    let row = store.find_match(created.id).await.unwrap().unwrap();
    assert_eq!(row.status, MatchStatus::Failed);

    // A guesser searching afterwards never sees the failed row.
    assert!(matches!(
        matchmaking::search(&state, &player("grace")).await,
        Err(ServiceError::Timeout)
    ));
}

/// Peers confirm readiness in reverse order (guesser first) and still
/// synchronize.
#[tokio::test]
async fn reverse_order_readiness_still_goes_live() {
    let (state, store) = state_with_store().await;
    let creator = player("ada");
    let guesser = player("grace");

    let created = match_service::create_match(
        &state,
        &creator,
        CreateMatchRequest {
            challenge_id: Some(Uuid::new_v4()),
        },
    )
    .await
    .unwrap();
    let match_id = created.id;

    store
        .claim_match(match_id, guesser.id, guesser.name.clone())
        .await
        .unwrap();

    let mut guesser_handshake = ReadyHandshake::begin(&state, match_id, Role::Guesser);
    guesser_handshake.mark_local_ready().unwrap();
    let guesser_task = tokio::spawn(guesser_handshake.await_synchronized());

    sleep(Duration::from_millis(20)).await;

    let mut creator_handshake = ReadyHandshake::begin(&state, match_id, Role::Creator);
    creator_handshake.mark_local_ready().unwrap();

    assert!(creator_handshake.await_synchronized().await.unwrap().is_live());
    assert!(guesser_task.await.unwrap().unwrap().is_live());
}

/// A creator navigating away before any join leaves no orphaned waiting row
/// behind.
#[tokio::test]
async fn abandoned_waiting_rooms_are_cleaned_up() {
    let (state, store) = state_with_store().await;
    let creator = player("ada");

    let created = match_service::create_match(
        &state,
        &creator,
        CreateMatchRequest {
            challenge_id: Some(Uuid::new_v4()),
        },
    )
    .await
    .unwrap();

    WaitingRoom::open(&state, created.id).abandon();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(store.find_match(created.id).await.unwrap(), None);
    assert!(matches!(
        match_service::join_match(&state, &player("grace")).await,
        Err(ServiceError::NotFound(_))
    ));
}
