//! Subscriber channels
//!
//! The broadcaster only sees [`SubscriberSink`]: something that accepts a
//! serialized payload or fails. The WebSocket and SSE handlers sit on the
//! other end of a [`ChannelSink`] and own the actual wire.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Unique subscriber id, never reused within a process
pub type SubscriberId = u64;

/// Why a delivery to one subscriber failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber channel closed")]
    Closed,

    #[error("subscriber buffer full")]
    Full,

    #[error("write failed: {0}")]
    Write(String),
}

/// Outbound half of a client connection
pub trait SubscriberSink: Send + Sync {
    /// Hand a payload to the connection without waiting on the network
    fn send(&self, payload: &str) -> Result<(), DeliveryError>;

    /// Close the channel; later sends fail with [`DeliveryError::Closed`]
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Sink backed by a bounded mpsc channel
///
/// A full buffer means the client is not keeping up; that counts as a
/// failed send and the subscriber is dropped.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver the connection task reads from
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl SubscriberSink for ChannelSink {
    fn send(&self, payload: &str) -> Result<(), DeliveryError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(DeliveryError::Closed)?;
        tx.try_send(payload.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self) {
        // Dropping the sender ends the receiver's stream
        self.tx.lock().take();
    }

    fn is_closed(&self) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }
}

/// A registered subscriber as seen by its connection handler
pub struct Subscriber {
    id: SubscriberId,
    rx: mpsc::Receiver<String>,
}

impl Subscriber {
    pub(crate) fn new(id: SubscriberId, rx: mpsc::Receiver<String>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next payload, or `None` once the broadcaster closed the channel
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Non-blocking receive, mostly for tests
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}
