//! ABOUTME: EventBus - async pub/sub with pattern-based subscriptions over a bounded broadcast channel
//! ABOUTME: Publishers always await the send; a lagging subscriber observes `RecvError::Lagged`

use crate::event::WorkflowEvent;
use crate::pattern::EventPattern;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// Default channel capacity. Publishers block on `send` only when every
/// receiver's ring buffer is full at once (broadcast semantics); a slow
/// subscriber instead falls behind and sees `Lagged`, never the publisher.
const DEFAULT_CAPACITY: usize = 4096;

/// A single-producer-multi-consumer stream of [`WorkflowEvent`]s.
///
/// Cloning an `EventBus` shares the underlying channel; every clone can
/// publish and every subscriber sees every event published after it
/// subscribed.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
    subscriptions: std::sync::Arc<DashMap<Uuid, EventPattern>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            subscriptions: std::sync::Arc::new(DashMap::new()),
        }
    }

    /// Publish an event to every current subscriber. Never blocks beyond the
    /// channel's internal bookkeeping: broadcast sends do not wait for slow
    /// receivers to drain, they only fail if there are zero receivers.
    pub fn publish(&self, event: WorkflowEvent) {
        // A publish with no subscribers is not an error; events may simply
        // have no consumer yet (e.g. compile-time events before a caller
        // subscribes).
        let _ = self.tx.send(event);
    }

    /// Subscribe to every event on the bus.
    #[must_use]
    pub fn subscribe_all(&self) -> EventSubscription {
        self.subscribe(EventPattern::new("*").expect("'*' is always a valid pattern"))
    }

    /// Subscribe to events whose `event_type()` matches `pattern` (exact
    /// match, or a `prefix.*` wildcard).
    #[must_use]
    pub fn subscribe(&self, pattern: EventPattern) -> EventSubscription {
        let id = Uuid::new_v4();
        self.subscriptions.insert(id, pattern.clone());
        EventSubscription {
            id,
            pattern,
            inner: BroadcastStream::new(self.tx.subscribe()),
            subscriptions: self.subscriptions.clone(),
        }
    }

    /// Number of currently live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription returned by [`EventBus::subscribe`]. Implements
/// [`futures::Stream`] so consumers can `.next().await` it directly.
pub struct EventSubscription {
    id: Uuid,
    pattern: EventPattern,
    inner: BroadcastStream<WorkflowEvent>,
    subscriptions: std::sync::Arc<DashMap<Uuid, EventPattern>>,
}

/// An error observed while draining a subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("subscriber lagged behind and missed {0} event(s)")]
    Lagged(u64),
}

impl EventSubscription {
    /// Pull the next event matching this subscription's pattern, skipping
    /// any that don't match. Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<Result<WorkflowEvent, SubscriptionError>> {
        use futures::StreamExt;
        loop {
            match self.inner.next().await {
                None => return None,
                Some(Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n))) => {
                    return Some(Err(SubscriptionError::Lagged(n)));
                }
                Some(Ok(event)) => {
                    if self.pattern.matches(event.event_type()) {
                        return Some(Ok(event));
                    }
                }
            }
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.subscriptions.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn started(run_id: Uuid) -> WorkflowEvent {
        WorkflowEvent::WorkflowStarted {
            run_id,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_then_subscribe_pattern_filters() {
        let bus = EventBus::new();
        let mut step_only = bus.subscribe(EventPattern::new("step.*").unwrap());
        let run_id = Uuid::new_v4();

        bus.publish(started(run_id));
        bus.publish(WorkflowEvent::StepStarted {
            run_id,
            step_id: "s1".into(),
            step_index: 0,
        });

        let event = step_only.recv().await.unwrap().unwrap();
        assert_eq!(event.event_type(), "step.started");
    }

    #[tokio::test]
    async fn subscribe_all_sees_every_event() {
        let bus = EventBus::new();
        let mut all = bus.subscribe_all();
        bus.publish(started(Uuid::new_v4()));
        let event = all.recv().await.unwrap().unwrap();
        assert_eq!(event.event_type(), "workflow.started");
    }

    #[test]
    fn subscriber_count_tracks_live_subscriptions() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let sub = bus.subscribe_all();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
    }
}
