//! Dispatch loop: the single consumer of the notification queue

use std::sync::Arc;

use tokio::time::Instant;

use super::broadcaster::Broadcaster;
use super::rate::RateWindow;

/// Drains the queue one event at a time and gates broadcasts on the
/// rate window
pub(crate) struct Dispatcher {
    broadcaster: Arc<Broadcaster>,
    rate: RateWindow,
}

impl Dispatcher {
    pub(crate) fn new(broadcaster: Arc<Broadcaster>) -> Self {
        let rate = RateWindow::new(broadcaster.config().min_interval);
        Self { broadcaster, rate }
    }

    /// Run until the broadcaster's shutdown token fires
    ///
    /// An event that arrives inside the rate window is held on a single
    /// timer. Events of the same kind that arrive while it is held are
    /// merged into it, so a burst turns into one delivery per window and the
    /// last change of the burst is never lost.
    pub(crate) async fn run(mut self) {
        let shutdown = self.broadcaster.shutdown.clone();

        loop {
            let mut event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.broadcaster.queue.pop() => match next {
                    Some(event) => event,
                    None => break,
                },
            };

            let wait = self.rate.remaining(Instant::now());
            if !wait.is_zero() {
                tracing::trace!(
                    kind = %event.kind,
                    wait_ms = wait.as_millis() as u64,
                    "Holding notification for rate window"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                if let Some(newer) = self.broadcaster.queue.take_kind(event.kind) {
                    event.merge(newer);
                }
            }

            if self.broadcaster.deliver(event) > 0 {
                self.rate.record(Instant::now());
            }
        }

        tracing::debug!("Notification dispatcher stopped");
    }
}
