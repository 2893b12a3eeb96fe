//! Bridges bus topic subscriptions onto HTTP Server-Sent Event responses.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::state::TopicSubscription;

/// Convert a topic subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
///
/// Dropping the forwarder also drops the subscription, which prunes the topic
/// once its last subscriber is gone.
pub fn to_sse_stream(
    mut subscription: TopicSubscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from the topic and pushes into mpsc
    tokio::spawn(async move {
        let topic = subscription.topic().to_string();
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                maybe = subscription.recv() => {
                    match maybe {
                        Some(payload) => {
                            let event = Event::default().event(payload.event).data(payload.data);
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        tracing::info!(topic = %topic, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when the client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
