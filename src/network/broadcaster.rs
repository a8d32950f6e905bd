//! Event Broadcaster
//!
//! The simulation publishes through [`EventBroadcaster`] and never sees the
//! transport. Delivery is at-least-once to the subscribers connected at
//! publish time, with no ordering guarantee across subscribers.

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::game::events::{GameEvent, Topic};
use crate::network::protocol::ServerMessage;

/// Broadcast errors.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// Event could not be encoded.
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Topic-based publish primitive.
pub trait EventBroadcaster: Send + Sync {
    /// Deliver an event to every current subscriber.
    fn publish(&self, topic: Topic, event: &GameEvent) -> Result<(), BroadcastError>;

    /// Publish, logging failures instead of returning them.
    fn emit(&self, topic: Topic, event: GameEvent) {
        if let Err(e) = self.publish(topic, &event) {
            warn!("Dropped {} on {:?}: {}", event.name(), topic, e);
        }
    }
}

/// A serialized broadcast frame, shared by every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastFrame {
    /// Topic the event was published on.
    pub topic: Topic,
    /// `ServerMessage::Broadcast` encoded as JSON.
    pub json: Arc<str>,
}

// =============================================================================
// TOKIO BROADCAST CHANNEL
// =============================================================================

/// Fan-out over a tokio broadcast channel. Each connection subscribes.
///
/// Events are serialized once per publish. A subscriber that falls more
/// than `capacity` frames behind skips the oldest ones.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<BroadcastFrame>,
}

impl ChannelBroadcaster {
    /// Create a channel holding up to `capacity` undelivered frames.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New subscription starting at the next published frame.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastFrame> {
        self.tx.subscribe()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventBroadcaster for ChannelBroadcaster {
    fn publish(&self, topic: Topic, event: &GameEvent) -> Result<(), BroadcastError> {
        let json = ServerMessage::Broadcast { topic, event: event.clone() }.to_json()?;
        let frame = BroadcastFrame { topic, json: Arc::from(json) };

        // No subscribers is not an error
        if self.tx.send(frame).is_err() {
            debug!("No subscribers for {}", event.name());
        }
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY RECORDER
// =============================================================================

/// Records every published event. Used by tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryBroadcaster {
    events: Mutex<Vec<(Topic, GameEvent)>>,
}

impl MemoryBroadcaster {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order.
    pub fn events(&self) -> Vec<(Topic, GameEvent)> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Events with the given client-facing name.
    pub fn named(&self, name: &str) -> Vec<(Topic, GameEvent)> {
        self.events()
            .into_iter()
            .filter(|(_, e)| e.name() == name)
            .collect()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl EventBroadcaster for MemoryBroadcaster {
    fn publish(&self, topic: Topic, event: &GameEvent) -> Result<(), BroadcastError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((topic, event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::HeroId;

    #[tokio::test]
    async fn test_channel_fans_out_to_all_subscribers() {
        let broadcaster = ChannelBroadcaster::new(16);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.emit(Topic::Hero, GameEvent::HeroRemoved(HeroId(5)));

        let fa = a.recv().await.unwrap();
        let fb = b.recv().await.unwrap();
        assert_eq!(fa, fb);
        assert_eq!(fa.topic, Topic::Hero);
        assert!(fa.json.contains("\"HeroRemoved\""));
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let broadcaster = ChannelBroadcaster::new(4);
        assert!(broadcaster.publish(Topic::Enemy, &GameEvent::HeroRemoved(HeroId(1))).is_ok());
    }

    #[test]
    fn test_memory_recorder() {
        let memory = MemoryBroadcaster::new();
        memory.emit(Topic::Hero, GameEvent::HeroRemoved(HeroId(1)));
        memory.emit(Topic::Hero, GameEvent::HeroRemoved(HeroId(2)));
        assert_eq!(memory.named("HeroRemoved").len(), 2);
        memory.clear();
        assert!(memory.events().is_empty());
    }
}
