//! Coalescing event queue between write paths and the dispatcher
//!
//! Producers push from synchronous request handlers and never wait: the
//! lock is held only to touch the deque. At most one event per kind is
//! pending; a second event of the same kind is merged into the first.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::event::{EventKind, NotificationEvent};

/// What happened to a pushed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended as a new pending event
    Queued,
    /// Merged into a pending event of the same kind
    Coalesced,
    /// Appended after evicting the oldest pending event
    DroppedOldest,
    /// Queue closed, event discarded
    Closed,
}

struct QueueState {
    pending: VecDeque<NotificationEvent>,
    closed: bool,
    dropped: u64,
}

/// Bounded queue with per-kind coalescing
pub struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue without blocking
    pub fn push(&self, event: NotificationEvent) -> PushOutcome {
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return PushOutcome::Closed;
            }

            if let Some(pending) = state.pending.iter_mut().find(|e| e.kind == event.kind) {
                pending.merge(event);
                return PushOutcome::Coalesced;
            }

            let outcome = if state.pending.len() >= self.capacity {
                state.pending.pop_front();
                state.dropped += 1;
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            state.pending.push_back(event);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Wait for the next event; `None` once the queue is closed
    pub async fn pop(&self) -> Option<NotificationEvent> {
        loop {
            {
                let mut state = self.state.lock();
                if let Some(event) = state.pending.pop_front() {
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a push between the check and
            // this await is not lost
            self.notify.notified().await;
        }
    }

    pub fn try_pop(&self) -> Option<NotificationEvent> {
        self.state.lock().pending.pop_front()
    }

    /// Remove the pending event of `kind`, if any
    pub fn take_kind(&self, kind: EventKind) -> Option<NotificationEvent> {
        let mut state = self.state.lock();
        let index = state.pending.iter().position(|e| e.kind == kind)?;
        state.pending.remove(index)
    }

    /// Close the queue and discard what is still pending
    ///
    /// Returns the number of discarded events.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.state.lock();
            state.closed = true;
            let n = state.pending.len();
            state.pending.clear();
            n
        };
        self.notify.notify_waiters();
        self.notify.notify_one();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events evicted because the queue was full
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}
