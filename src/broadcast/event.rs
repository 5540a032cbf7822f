//! Notification events and the wire message pushed to dashboard clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical kind of a notification; pending events coalesce per kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// A create/update/delete changed the item store
    DataChanged,
    /// Manually triggered test notification
    Test,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DataChanged => "data-changed",
            EventKind::Test => "test",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event produced on a write path and consumed once by the dispatcher
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationEvent {
    pub kind: EventKind,
    /// What happened, e.g. `item_created`
    pub change_type: String,
    /// Opaque details forwarded to clients
    pub details: Value,
    /// How many producer calls this event stands for
    pub coalesced: u32,
}

impl NotificationEvent {
    pub fn new(kind: EventKind, change_type: impl Into<String>, details: Value) -> Self {
        Self {
            kind,
            change_type: change_type.into(),
            details,
            coalesced: 1,
        }
    }

    /// A `data-changed` event
    pub fn data_changed(change_type: impl Into<String>, details: Value) -> Self {
        Self::new(EventKind::DataChanged, change_type, details)
    }

    /// Fold a newer event of the same kind into this one
    ///
    /// The newest description wins; the count keeps growing so clients can
    /// tell that several changes were merged.
    pub fn merge(&mut self, newer: NotificationEvent) {
        debug_assert_eq!(self.kind, newer.kind);
        self.change_type = newer.change_type;
        self.details = newer.details;
        self.coalesced = self.coalesced.saturating_add(newer.coalesced);
    }
}

/// Message sent to every subscriber for one broadcast
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub kind: EventKind,
    pub change_type: String,
    pub details: Value,
    pub coalesced: u32,
    /// Monotonically increasing id for gap detection
    pub sequence_id: u64,
    /// Unix timestamp (seconds, fractional)
    pub timestamp: f64,
}

impl DashboardMessage {
    pub fn from_event(event: NotificationEvent, sequence_id: u64) -> Self {
        let now = chrono::Utc::now();
        Self {
            msg_type: "data_change".to_string(),
            kind: event.kind,
            change_type: event.change_type,
            details: event.details,
            coalesced: event.coalesced,
            sequence_id,
            timestamp: now.timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Welcome message sent when a subscriber connects
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub subscriber_id: u64,
    pub current_sequence_id: u64,
}

impl WelcomeMessage {
    pub fn new(subscriber_id: u64, current_sequence_id: u64) -> Self {
        Self {
            msg_type: "connected".to_string(),
            subscriber_id,
            current_sequence_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_newest_and_counts() {
        let mut held = NotificationEvent::data_changed("item_created", json!({"item_id": 1}));
        held.merge(NotificationEvent::data_changed("item_deleted", json!({"item_id": 2})));
        held.merge(NotificationEvent::data_changed("item_updated", json!({"item_id": 3})));

        assert_eq!(held.change_type, "item_updated");
        assert_eq!(held.details, json!({"item_id": 3}));
        assert_eq!(held.coalesced, 3);
    }

    #[test]
    fn test_message_serialization() {
        let event = NotificationEvent::data_changed("item_created", json!({"name": "Widget"}));
        let msg = DashboardMessage::from_event(event, 42);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "data_change");
        assert_eq!(json["kind"], "data-changed");
        assert_eq!(json["change_type"], "item_created");
        assert_eq!(json["sequence_id"], 42);
        assert_eq!(json["details"]["name"], "Widget");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EventKind::DataChanged.to_string(), "data-changed");
        assert_eq!(EventKind::Test.as_str(), "test");
    }
}
