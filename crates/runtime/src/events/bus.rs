//! Topic-based event bus for observers of a battle session.
//!
//! The bus is local to one peer. It carries copies of what the session
//! did (updates sent or replayed, combat log lines, lifecycle changes) for
//! UIs and tests; nothing on it feeds back into battle state.

use battle_core::{AbsoluteSide, BattleOutcome, LogEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::NetworkUpdate;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Updates emitted by the host or replayed by the guest
    Sync,
    /// Combat log lines
    CombatLog,
    /// Battle start and end
    Lifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncEvent {
    Emitted(NetworkUpdate),
    Replayed(NetworkUpdate),
    /// The guest rejected an update; its mirror may have diverged.
    Rejected { seq: u64, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
    BattleStarted { peer: AbsoluteSide },
    BattleEnded { peer: AbsoluteSide, outcome: BattleOutcome },
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Sync(SyncEvent),
    CombatLog { peer: AbsoluteSide, entry: LogEntry },
    Lifecycle(LifecycleEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Sync(_) => Topic::Sync,
            Event::CombatLog { .. } => Topic::CombatLog,
            Event::Lifecycle(_) => Topic::Lifecycle,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about.
#[derive(Clone)]
pub struct EventBus {
    sync: broadcast::Sender<Event>,
    combat_log: broadcast::Sender<Event>,
    lifecycle: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sync: broadcast::channel(capacity).0,
            combat_log: broadcast::channel(capacity).0,
            lifecycle: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Sync => &self.sync,
            Topic::CombatLog => &self.combat_log,
            Topic::Lifecycle => &self.lifecycle,
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    pub fn subscribe_multiple(&self, topics: &[Topic]) -> Vec<(Topic, broadcast::Receiver<Event>)> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::LogSeverity;

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = EventBus::with_capacity(8);
        let mut log_rx = bus.subscribe(Topic::CombatLog);
        let mut lifecycle_rx = bus.subscribe(Topic::Lifecycle);

        bus.publish(Event::Lifecycle(LifecycleEvent::BattleStarted {
            peer: AbsoluteSide::Host,
        }));
        bus.publish(Event::CombatLog {
            peer: AbsoluteSide::Host,
            entry: LogEntry {
                message: "2 enemies poisoned.".into(),
                severity: LogSeverity::Success,
            },
        });

        assert!(matches!(
            lifecycle_rx.recv().await.unwrap(),
            Event::Lifecycle(LifecycleEvent::BattleStarted { .. })
        ));
        match log_rx.recv().await.unwrap() {
            Event::CombatLog { entry, .. } => assert_eq!(entry.message, "2 enemies poisoned."),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(log_rx.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(Event::Lifecycle(LifecycleEvent::BattleEnded {
            peer: AbsoluteSide::Guest,
            outcome: BattleOutcome::Draw,
        }));
    }
}
