//! Rate window for outbound broadcasts

use std::time::Duration;
use tokio::time::Instant;

/// Last successful broadcast and the minimum spacing between broadcasts
#[derive(Debug, Clone)]
pub struct RateWindow {
    min_interval: Duration,
    last_broadcast: Option<Instant>,
}

impl RateWindow {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_broadcast: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_broadcast(&self) -> Option<Instant> {
        self.last_broadcast
    }

    /// Time left before the next broadcast may go out; zero when open
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_broadcast {
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    pub fn record(&mut self, now: Instant) {
        self.last_broadcast = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_window_is_open() {
        let window = RateWindow::new(Duration::from_secs(1));
        assert!(window.is_open(Instant::now()));
    }

    #[test]
    fn test_remaining_after_record() {
        let mut window = RateWindow::new(Duration::from_secs(1));
        let start = Instant::now();
        window.record(start);

        assert_eq!(window.remaining(start), Duration::from_secs(1));
        assert_eq!(
            window.remaining(start + Duration::from_millis(300)),
            Duration::from_millis(700)
        );
        assert!(window.is_open(start + Duration::from_secs(1)));
        assert!(window.is_open(start + Duration::from_secs(5)));
    }
}
