//! Live dashboard notifications
//!
//! Write paths call [`Broadcaster::notify`] and return immediately; one
//! dispatcher task delivers to every connected subscriber, at most once per
//! rate window, coalescing bursts of the same kind.
//!
//! ## Features
//! - Per-kind coalescing queue (hold-and-merge)
//! - Global rate window (default 1 second between broadcasts)
//! - Per-subscriber failure isolation
//! - Sequence ids for gap detection on the client

pub mod broadcaster;
mod dispatcher;
pub mod event;
pub mod queue;
pub mod rate;
pub mod subscriber;

pub use broadcaster::{BroadcastStats, Broadcaster, BroadcasterConfig};
pub use event::{DashboardMessage, EventKind, NotificationEvent, WelcomeMessage};
pub use queue::{EventQueue, PushOutcome};
pub use rate::RateWindow;
pub use subscriber::{ChannelSink, DeliveryError, Subscriber, SubscriberId, SubscriberSink};
