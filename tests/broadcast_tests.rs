//! Timing tests for the notification broadcaster
//!
//! All tests run on a paused clock, so sleeps advance virtual time exactly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use livedash::broadcast::{
    Broadcaster, BroadcasterConfig, DashboardMessage, DeliveryError, NotificationEvent,
    Subscriber, SubscriberSink,
};
use serde_json::json;

/// Sink whose transport is always broken
#[derive(Default)]
struct BrokenSink {
    attempts: AtomicUsize,
}

impl SubscriberSink for BrokenSink {
    fn send(&self, _payload: &str) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Write("broken pipe".to_string()))
    }

    fn close(&self) {}

    fn is_closed(&self) -> bool {
        false
    }
}

fn started() -> Arc<Broadcaster> {
    let broadcaster = Arc::new(Broadcaster::new(BroadcasterConfig::default()));
    broadcaster.start();
    broadcaster
}

fn drain(subscriber: &mut Subscriber) -> Vec<DashboardMessage> {
    let mut messages = Vec::new();
    while let Some(payload) = subscriber.try_recv() {
        messages.push(serde_json::from_str(&payload).unwrap());
    }
    messages
}

fn change(n: u64) -> NotificationEvent {
    NotificationEvent::data_changed("item_created", json!({ "item_id": n }))
}

#[tokio::test(start_paused = true)]
async fn test_burst_is_rate_limited_and_coalesced() {
    let broadcaster = started();
    let mut subscribers: Vec<Subscriber> = (0..3).map(|_| broadcaster.subscribe()).collect();
    let broken = Arc::new(BrokenSink::default());
    broadcaster.register(broken.clone());
    assert_eq!(broadcaster.subscriber_count(), 4);

    // Five writes within 200 ms
    for n in 1..=5 {
        broadcaster.notify(change(n));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Up to just before the window closes: exactly one broadcast
    tokio::time::sleep(Duration::from_millis(700)).await;
    for subscriber in subscribers.iter_mut() {
        let messages = drain(subscriber);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].coalesced, 1);
        assert_eq!(messages[0].details, json!({ "item_id": 1 }));
    }

    // Broken subscriber was dropped after its first failure
    assert_eq!(broadcaster.subscriber_count(), 3);
    assert_eq!(broken.attempts.load(Ordering::SeqCst), 1);

    // The held burst goes out once the window reopens
    tokio::time::sleep(Duration::from_millis(200)).await;
    for subscriber in subscribers.iter_mut() {
        let messages = drain(subscriber);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].coalesced, 4);
        assert_eq!(messages[0].details, json!({ "item_id": 5 }));
        assert_eq!(messages[0].sequence_id, 1);
    }

    let stats = broadcaster.stats();
    assert_eq!(stats.broadcasts, 2);
    assert_eq!(stats.deliveries, 6);
    assert_eq!(stats.failed_deliveries, 1);

    broadcaster.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_spaced_events_are_not_delayed() {
    let broadcaster = started();
    let mut subscriber = broadcaster.subscribe();

    broadcaster.notify(change(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(drain(&mut subscriber).len(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    broadcaster.notify(change(2));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(drain(&mut subscriber).len(), 1);

    broadcaster.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_subscriber_does_not_block_others() {
    let config = BroadcasterConfig {
        subscriber_buffer: 1,
        ..BroadcasterConfig::default()
    };
    let broadcaster = Arc::new(Broadcaster::new(config));
    broadcaster.start();

    // Never reads, so its single-slot buffer fills on the first broadcast
    let _stalled = broadcaster.subscribe();
    let mut active = broadcaster.subscribe();

    broadcaster.notify(change(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(drain(&mut active).len(), 1);

    broadcaster.notify(change(2));
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(drain(&mut active).len(), 1);
    assert_eq!(broadcaster.subscriber_count(), 1);

    broadcaster.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_events_without_subscribers_do_not_open_window() {
    let broadcaster = started();

    broadcaster.notify(change(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(broadcaster.stats().broadcasts, 0);

    // First subscriber gets the next event immediately
    let mut subscriber = broadcaster.subscribe();
    broadcaster.notify(change(2));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let messages = drain(&mut subscriber);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sequence_id, 0);

    broadcaster.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_delivery_after_shutdown() {
    let broadcaster = started();
    let mut subscriber = broadcaster.subscribe();

    broadcaster.notify(change(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    // Held by the rate window when shutdown begins
    broadcaster.notify(change(2));

    broadcaster.shutdown().await;
    broadcaster.notify(change(3));
    tokio::time::sleep(Duration::from_secs(5)).await;

    let messages = drain(&mut subscriber);
    assert_eq!(messages.len(), 1);
    assert_eq!(subscriber.recv().await, None);
    assert_eq!(broadcaster.subscriber_count(), 0);
    assert_eq!(broadcaster.stats().broadcasts, 1);
}
