// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Node Events
//
// In-memory event streaming over tokio broadcast channels, injected per
// tenant. publish() returns after enqueueing; each subscriber drains its own
// receiver on a spawned task, so events arrive in publication order within a
// subscriber and handler failures never reach the publisher. Delivery is
// best-effort at-most-once: a lagging subscriber loses the oldest events.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::events::{NodeEvent, NodeEventKind};

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<NodeEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity. Capacity
    /// bounds how many events may buffer before slow subscribers drop.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create an event bus with default capacity (1000).
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers. Events with no subscriber are
    /// dropped.
    pub fn publish(&self, event: NodeEvent) {
        let _receiver_count = self.sender.send(event).unwrap_or(0);
    }

    /// Subscribe with a raw receiver. Useful in tests and for streaming
    /// surfaces.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Register an async handler for the given event kinds (`None` = all).
    /// The handler runs on its own task; events are delivered to it in
    /// publication order. The returned token cancels the subscription.
    pub fn subscribe_handler<F, Fut>(
        &self,
        kinds: Option<Vec<NodeEventKind>>,
        handler: F,
    ) -> SubscriptionToken
    where
        F: Fn(NodeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Some(kinds) = &kinds {
                            if !kinds.contains(&event.kind) {
                                continue;
                            }
                        }
                        handler(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        SubscriptionToken { handle }
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cancellation token for a handler subscription. Dropping the token leaves
/// the subscription running; call [`SubscriptionToken::cancel`] to stop it.
pub struct SubscriptionToken {
    handle: JoinHandle<()>,
}

impl SubscriptionToken {
    pub fn cancel(self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Receiver for node events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<NodeEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocks until one is available).
    pub async fn recv(&mut self) -> Result<NodeEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Result<NodeEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::Node;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn event(title: &str) -> NodeEvent {
        let node = Node::new(
            uuid::Uuid::new_v4().to_string(),
            title,
            "text/plain",
            "o@antbox.io",
            "default",
            Utc::now(),
        );
        NodeEvent::created(node, "o@antbox.io", Utc::now())
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.publish(event("a"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.node.title, "a");
        assert_eq!(received.kind, NodeEventKind::Created);
    }

    #[tokio::test]
    async fn test_handler_receives_in_publication_order() {
        let bus = EventBus::new(64);
        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let _token = bus.subscribe_handler(None, move |event| {
            let seen = seen_clone.clone();
            async move {
                seen.lock().await.push(event.node.title.clone());
            }
        });

        // Give the subscriber task a chance to attach.
        tokio::time::sleep(Duration::from_millis(10)).await;

        for i in 0..5 {
            bus.publish(event(&format!("n{}", i)));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seen = seen.lock().await;
        assert_eq!(*seen, vec!["n0", "n1", "n2", "n3", "n4"]);
    }

    #[tokio::test]
    async fn test_kind_filtering() {
        let bus = EventBus::new(16);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let _token = bus.subscribe_handler(Some(vec![NodeEventKind::Deleted]), move |_| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        bus.publish(event("created-only"));
        let node = event("x").node;
        bus.publish(NodeEvent::deleted(node, "o@antbox.io", Utc::now()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_token_stops_delivery() {
        let bus = EventBus::new(16);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let token = bus.subscribe_handler(None, move |_| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        bus.publish(event("first"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;

        bus.publish(event("second"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_events_without_subscribers_are_dropped() {
        let bus = EventBus::new(4);
        // No subscriber attached; publish must not fail.
        bus.publish(event("nobody-listens"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut r1 = bus.subscribe();
        let mut r2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(event("shared"));
        assert_eq!(r1.recv().await.unwrap().node.title, "shared");
        assert_eq!(r2.recv().await.unwrap().node.title, "shared");
    }
}
