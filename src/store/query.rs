//! Read operations for the item store

use std::collections::BTreeMap;

use crate::types::{DashboardData, Item};

use super::{ItemStore, StoreError, StoreResult, StoreStats, ITEMS_TABLE};

/// All items, newest first
pub fn list_items(store: &ItemStore) -> Vec<Item> {
    let data = store.data.read();
    let mut items = data.items.clone();
    drop(data);

    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    items
}

/// A single item by id
pub fn get_item(store: &ItemStore, id: u64) -> StoreResult<Item> {
    store
        .data
        .read()
        .items
        .iter()
        .find(|i| i.id == id)
        .cloned()
        .ok_or(StoreError::NotFound(id))
}

/// Total count plus the `limit` most recent items
pub fn dashboard_data(store: &ItemStore, limit: usize) -> DashboardData {
    let mut recent_items = list_items(store);
    let total_items = recent_items.len();
    recent_items.truncate(limit);

    DashboardData {
        total_items,
        recent_items,
    }
}

/// File size and record counts
pub fn stats(store: &ItemStore) -> StoreStats {
    let bytes = store.file_size();
    let database_size_mib = ((bytes as f64 / (1024.0 * 1024.0)) * 100.0).round() / 100.0;

    let mut tables = BTreeMap::new();
    tables.insert(ITEMS_TABLE.to_string(), store.count());

    StoreStats {
        database_size_mib,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemCreate;
    use tempfile::TempDir;

    fn setup_with(n: usize) -> (ItemStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = ItemStore::open(temp_dir.path().join("db.json")).unwrap();
        for i in 0..n {
            store
                .create(ItemCreate {
                    name: format!("Item {}", i),
                    description: None,
                })
                .unwrap();
        }
        (store, temp_dir)
    }

    #[test]
    fn test_list_newest_first() {
        let (store, _temp_dir) = setup_with(3);
        let ids: Vec<u64> = list_items(&store).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_get_item() {
        let (store, _temp_dir) = setup_with(2);
        assert_eq!(get_item(&store, 2).unwrap().name, "Item 1");
        assert!(matches!(get_item(&store, 9), Err(StoreError::NotFound(9))));
    }

    #[test]
    fn test_dashboard_data_limits_recent() {
        let (store, _temp_dir) = setup_with(12);
        let data = dashboard_data(&store, 10);
        assert_eq!(data.total_items, 12);
        assert_eq!(data.recent_items.len(), 10);
        assert_eq!(data.recent_items[0].id, 12);
    }

    #[test]
    fn test_stats_counts_items() {
        let (store, _temp_dir) = setup_with(4);
        let stats = stats(&store);
        assert_eq!(stats.tables.get(ITEMS_TABLE), Some(&4));
        assert!(stats.database_size_mib >= 0.0);
    }
}
