//! Topic-based notification bus over per-topic broadcast channels.
//!
//! Delivery is best-effort and unordered across event names: subscribers that
//! attach after a publish never see it, nothing is persisted, and a publish
//! onto a topic nobody subscribes to is silently dropped. Anything
//! correctness-critical must fall back to the match store.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

/// Dispatched payload carried across bus topics.
#[derive(Clone, Debug)]
pub struct BusEvent {
    /// Event name, e.g. `ready` or `draw`.
    pub event: String,
    /// JSON-serialized payload.
    pub data: String,
}

impl BusEvent {
    /// Convenience wrapper that serialises `payload` into the data field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_string(payload)?,
        })
    }
}

type TopicMap = Arc<DashMap<String, broadcast::Sender<BusEvent>>>;

/// Registry of named topics, each backed by a Tokio broadcast channel.
#[derive(Clone)]
pub struct TopicHub {
    capacity: usize,
    topics: TopicMap,
}

impl TopicHub {
    /// Construct a hub whose topics each buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            topics: Arc::new(DashMap::new()),
        }
    }

    /// Register a subscriber on `topic`, creating the topic on first use.
    ///
    /// The returned handle removes itself from the topic on drop; the last
    /// handle to go away prunes the topic entirely.
    pub fn subscribe(&self, topic: &str) -> TopicSubscription {
        let sender = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();

        TopicSubscription {
            topic: topic.to_string(),
            receiver: Some(sender.subscribe()),
            topics: Arc::clone(&self.topics),
        }
    }

    /// Send an event to all current subscribers of `topic`, ignoring delivery
    /// errors. A topic with no subscribers swallows the event.
    pub fn publish(&self, topic: &str, event: BusEvent) {
        if let Some(sender) = self.topics.get(topic) {
            let _ = sender.send(event);
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

/// Live subscription handle on a single topic.
pub struct TopicSubscription {
    topic: String,
    receiver: Option<broadcast::Receiver<BusEvent>>,
    topics: TopicMap,
}

impl TopicSubscription {
    /// Receive the next event, or `None` once the topic is gone.
    ///
    /// A lagged receiver skips the overwritten events and keeps going; the
    /// relay's apply-in-arrival-order contract starts at whatever is still
    /// buffered.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Closed) => return None,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "bus subscriber lagged");
                    continue;
                }
            }
        }
    }

    /// Name of the subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Detach from the topic. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for TopicSubscription {
    fn drop(&mut self) {
        // Drop our receiver first, then prune the topic if nobody is left.
        self.receiver.take();
        self.topics
            .remove_if(&self.topic, |_, sender| sender.receiver_count() == 0);
    }
}
