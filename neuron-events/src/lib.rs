//! In-memory event bus (spec.md §2 C3, §4.3).
//!
//! Publish is synchronous and non-blocking: it's a `broadcast::Sender::send`
//! per subscribed topic, which never awaits and never blocks on a slow
//! subscriber. A subscriber that falls behind the channel's capacity loses
//! its oldest unread events (`RecvError::Lagged`) rather than stalling the
//! publisher — the "drop-oldest on overflow" policy.

use std::sync::Mutex;

use async_trait::async_trait;
use neuron_types::id::SubscriptionId;
use neuron_types::{Event, EventBus};
use tokio::sync::broadcast;

/// Capacity of each per-subscriber broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

struct Subscriber {
    id: SubscriptionId,
    topic: String,
    sender: broadcast::Sender<Event>,
}

/// The default, in-process [`EventBus`] implementation.
pub struct InMemoryEventBus {
    capacity: usize,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: Mutex<u64>,
}

impl InMemoryEventBus {
    /// Build a bus whose per-subscriber queues hold [`DEFAULT_CAPACITY`] events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Build a bus with a custom per-subscriber queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            subscribers: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: Event) {
        let subs = self.subscribers.lock().unwrap();
        for sub in subs.iter().filter(|s| s.topic == event.topic) {
            // Err means no receivers left; never a backpressure signal.
            let _ = sub.sender.send(event.clone());
        }
    }

    async fn subscribe(&self, topic: &str) -> (SubscriptionId, broadcast::Receiver<Event>) {
        let (sender, receiver) = broadcast::channel(self.capacity);
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = SubscriptionId::new(format!("sub-{next}"));
            *next += 1;
            id
        };
        self.subscribers.lock().unwrap().push(Subscriber {
            id: id.clone(),
            topic: topic.to_owned(),
            sender,
        });
        (id, receiver)
    }

    async fn unsubscribe(&self, id: &SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|s| &s.id != id);
    }
}
