//! Notification broadcaster
//!
//! Owns the subscriber set and the event queue. Write paths call
//! [`Broadcaster::notify`], which only touches the queue. A single
//! dispatcher task (see [`super::dispatcher`]) drains the queue, enforces the
//! rate window and fans out to subscribers.
//!
//! # Design
//!
//! ```text
//! request task ─┐
//! request task ─┼─► notify() ─► EventQueue ─► Dispatcher ─► RateWindow ─► sinks
//! request task ─┘   (no I/O)    (coalesce)    (1 task)      (hold)       (isolated)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dispatcher::Dispatcher;
use super::event::{DashboardMessage, NotificationEvent};
use super::queue::{EventQueue, PushOutcome};
use super::subscriber::{ChannelSink, Subscriber, SubscriberId, SubscriberSink};

/// Tuning for the broadcaster
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Minimum spacing between two broadcasts
    pub min_interval: Duration,
    /// Pending events before the oldest is evicted
    pub queue_capacity: usize,
    /// Per-subscriber buffer; a full buffer counts as a failed send
    pub subscriber_buffer: usize,
    /// How long shutdown waits for the dispatcher to stop
    pub shutdown_grace: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            queue_capacity: 64,
            subscriber_buffer: 32,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// Counters exposed on the status endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastStats {
    pub subscribers: usize,
    pub pending_events: usize,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub failed_deliveries: u64,
    pub coalesced_events: u64,
    pub dropped_events: u64,
}

/// Rate-limited, queue-mediated broadcaster
pub struct Broadcaster {
    config: BroadcasterConfig,
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn SubscriberSink>>>,
    next_subscriber_id: AtomicU64,
    pub(crate) queue: EventQueue,
    sequence_counter: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    failed_deliveries: AtomicU64,
    coalesced_events: AtomicU64,
    pub(crate) shutdown: CancellationToken,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Broadcaster {
    pub fn new(config: BroadcasterConfig) -> Self {
        let queue = EventQueue::new(config.queue_capacity);
        Self {
            config,
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
            queue,
            sequence_counter: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
            coalesced_events: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    /// Spawn the dispatcher task; calling it again is a no-op
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.dispatcher.lock();
        if slot.is_some() || self.shutdown.is_cancelled() {
            return;
        }
        let dispatcher = Dispatcher::new(Arc::clone(self));
        *slot = Some(tokio::spawn(dispatcher.run()));
        tracing::info!(
            min_interval_ms = self.config.min_interval.as_millis() as u64,
            "Notification dispatcher started"
        );
    }

    /// Register a channel-backed subscriber
    pub fn subscribe(&self) -> Subscriber {
        let (sink, rx) = ChannelSink::new(self.config.subscriber_buffer);
        let id = self.register(Arc::new(sink));
        Subscriber::new(id, rx)
    }

    /// Register an arbitrary sink
    ///
    /// After shutdown the sink is closed at once and never stored, so the
    /// connection sees end-of-stream instead of waiting forever.
    pub fn register(&self, sink: Arc<dyn SubscriberSink>) -> SubscriberId {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        let total = {
            let mut subscribers = self.subscribers.lock();
            // Checked under the lock: shutdown cancels before it drains
            if self.shutdown.is_cancelled() {
                drop(subscribers);
                sink.close();
                tracing::debug!(subscriber = id, "Broadcaster stopped, subscriber rejected");
                return id;
            }
            subscribers.insert(id, sink);
            subscribers.len()
        };
        tracing::info!(subscriber = id, total, "Subscriber connected");
        id
    }

    /// Remove a subscriber; unknown ids are ignored
    ///
    /// Returns whether the id was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subscribers = self.subscribers.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        match removed {
            Some(sink) => {
                sink.close();
                tracing::info!(subscriber = id, total, "Subscriber disconnected");
                true
            }
            None => false,
        }
    }

    /// Queue an event for delivery; never waits
    pub fn notify(&self, event: NotificationEvent) {
        let kind = event.kind;
        match self.queue.push(event) {
            PushOutcome::Queued => tracing::trace!(%kind, "Notification queued"),
            PushOutcome::Coalesced => {
                self.coalesced_events.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(%kind, "Notification coalesced");
            }
            PushOutcome::DroppedOldest => {
                tracing::warn!(%kind, "Notification queue full, dropped oldest event")
            }
            PushOutcome::Closed => tracing::debug!(%kind, "Broadcaster stopped, notification ignored"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Sequence id the next broadcast will carry
    pub fn current_sequence_id(&self) -> u64 {
        self.sequence_counter.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
            pending_events: self.queue.len(),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            coalesced_events: self.coalesced_events.load(Ordering::Relaxed),
            dropped_events: self.queue.dropped(),
        }
    }

    /// Send one event to every current subscriber
    ///
    /// Returns how many subscribers were attempted. A failing subscriber is
    /// removed and does not affect the others.
    pub(crate) fn deliver(&self, event: NotificationEvent) -> usize {
        let targets: Vec<(SubscriberId, Arc<dyn SubscriberSink>)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        if targets.is_empty() {
            tracing::debug!(kind = %event.kind, "No subscribers, skipping broadcast");
            return 0;
        }

        let sequence_id = self.sequence_counter.fetch_add(1, Ordering::SeqCst);
        let message = DashboardMessage::from_event(event, sequence_id);
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize notification");
                return 0;
            }
        };

        let mut failed = Vec::new();
        for (id, sink) in &targets {
            match sink.send(&payload) {
                Ok(()) => {
                    self.deliveries.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.failed_deliveries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(subscriber = id, error = %e, "Delivery failed, dropping subscriber");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.unsubscribe(id);
        }

        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            sequence_id,
            change_type = %message.change_type,
            coalesced = message.coalesced,
            subscribers = targets.len(),
            "Broadcast sent"
        );
        targets.len()
    }

    /// Stop the dispatcher and close every subscriber
    ///
    /// Undelivered events are dropped. Waits at most the configured grace
    /// period for the dispatcher task.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.dispatcher.lock().take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.config.shutdown_grace, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Dispatcher task failed"),
                Err(_) => {
                    tracing::warn!("Dispatcher did not stop within grace period, aborting");
                    handle.abort();
                }
            }
        }

        let discarded = self.queue.close();
        if discarded > 0 {
            tracing::info!(discarded, "Dropped undelivered notifications");
        }

        let sinks: Vec<Arc<dyn SubscriberSink>> =
            self.subscribers.lock().drain().map(|(_, sink)| sink).collect();
        for sink in &sinks {
            sink.close();
        }
        tracing::info!(closed = sinks.len(), "Broadcaster shut down");
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcasterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::subscriber::DeliveryError;
    use serde_json::json;

    struct FailingSink;

    impl SubscriberSink for FailingSink {
        fn send(&self, _payload: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError::Write("connection reset".to_string()))
        }
        fn close(&self) {}
        fn is_closed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let broadcaster = Broadcaster::default();
        let keep = broadcaster.subscribe();
        let drop_me = broadcaster.subscribe();

        assert!(broadcaster.unsubscribe(drop_me.id()));
        assert!(!broadcaster.unsubscribe(drop_me.id()));
        assert!(!broadcaster.unsubscribe(9999));

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_ne!(keep.id(), drop_me.id());
    }

    #[test]
    fn test_deliver_isolates_failures() {
        let broadcaster = Broadcaster::default();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        let bad = broadcaster.register(Arc::new(FailingSink));

        let attempted = broadcaster.deliver(NotificationEvent::data_changed("item_created", json!({})));

        assert_eq!(attempted, 3);
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_some());
        assert_eq!(broadcaster.subscriber_count(), 2);
        assert!(!broadcaster.unsubscribe(bad));

        let stats = broadcaster.stats();
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.failed_deliveries, 1);
    }

    #[test]
    fn test_deliver_without_subscribers_is_not_a_broadcast() {
        let broadcaster = Broadcaster::default();
        let attempted = broadcaster.deliver(NotificationEvent::data_changed("item_created", json!({})));
        assert_eq!(attempted, 0);
        assert_eq!(broadcaster.current_sequence_id(), 0);
    }

    #[test]
    fn test_sequence_increments_per_broadcast() {
        let broadcaster = Broadcaster::default();
        let mut sub = broadcaster.subscribe();

        broadcaster.deliver(NotificationEvent::data_changed("a", json!({})));
        broadcaster.deliver(NotificationEvent::data_changed("b", json!({})));

        let first: DashboardMessage = serde_json::from_str(&sub.try_recv().unwrap()).unwrap();
        let second: DashboardMessage = serde_json::from_str(&sub.try_recv().unwrap()).unwrap();
        assert_eq!(first.sequence_id, 0);
        assert_eq!(second.sequence_id, 1);
        assert_eq!(broadcaster.current_sequence_id(), 2);
    }

    #[test]
    fn test_notify_coalesces_without_dispatcher() {
        let broadcaster = Broadcaster::default();
        for i in 0..5 {
            broadcaster.notify(NotificationEvent::data_changed("item_created", json!({ "i": i })));
        }
        let stats = broadcaster.stats();
        assert_eq!(stats.pending_events, 1);
        assert_eq!(stats.coalesced_events, 4);
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers() {
        let broadcaster = Arc::new(Broadcaster::default());
        broadcaster.start();
        let mut sub = broadcaster.subscribe();

        broadcaster.shutdown().await;

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert!(sub.recv().await.is_none());

        // Late notifications are ignored, not queued
        broadcaster.notify(NotificationEvent::data_changed("late", json!({})));
        assert_eq!(broadcaster.stats().pending_events, 0);
    }

    #[tokio::test]
    async fn test_subscribe_after_shutdown_is_closed() {
        let broadcaster = Arc::new(Broadcaster::default());
        broadcaster.start();
        broadcaster.shutdown().await;

        let mut sub = broadcaster.subscribe();

        assert_eq!(broadcaster.subscriber_count(), 0);
        let next = tokio::time::timeout(Duration::from_millis(200), sub.recv()).await;
        assert_eq!(next, Ok(None));
    }
}
