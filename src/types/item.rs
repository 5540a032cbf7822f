//! Item records and the request bodies that create or modify them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Create a new item stamped with `now`
    pub fn new(id: u64, name: String, description: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Body for creating an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body for a partial item update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemUpdate {
    /// True when the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Data backing the dashboard widgets
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub total_items: usize,
    pub recent_items: Vec<Item>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_update_is_empty() {
        assert!(ItemUpdate::default().is_empty());
        let update: ItemUpdate = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert!(!update.is_empty());
    }

    #[test]
    fn test_item_create_without_description() {
        let create: ItemCreate = serde_json::from_str(r#"{"name":"Widget"}"#).unwrap();
        assert_eq!(create.name, "Widget");
        assert!(create.description.is_none());
    }

    #[test]
    fn test_item_skips_missing_description() {
        let item = Item::new(1, "Widget".to_string(), None, Utc::now());
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("description"));
        assert!(json.contains("created_at"));
    }
}
