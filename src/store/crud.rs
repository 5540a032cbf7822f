//! Write operations for the item store
//!
//! Each operation holds the write lock for its whole duration, including
//! the flush to disk, so the file never lags behind memory.

use crate::types::{Item, ItemCreate, ItemUpdate};
use crate::utils::now;

use super::{ItemStore, StoreError, StoreResult};

fn validate_name(name: &str) -> StoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid("name must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Insert a new item and return it with its assigned id
pub fn create_item(store: &ItemStore, item: ItemCreate) -> StoreResult<Item> {
    let name = validate_name(&item.name)?;
    let mut data = store.data.write();

    let id = data.next_id;
    let created = Item::new(id, name, item.description, now());
    data.next_id += 1;
    data.items.push(created.clone());

    if let Err(e) = store.persist(&data) {
        data.items.pop();
        data.next_id -= 1;
        return Err(e);
    }

    tracing::debug!(item_id = id, "Item created");
    Ok(created)
}

/// Apply a partial update to an existing item
pub fn update_item(store: &ItemStore, id: u64, update: ItemUpdate) -> StoreResult<Item> {
    if update.is_empty() {
        return Err(StoreError::EmptyUpdate);
    }
    let name = update.name.as_deref().map(validate_name).transpose()?;

    let mut data = store.data.write();
    let index = data
        .items
        .iter()
        .position(|i| i.id == id)
        .ok_or(StoreError::NotFound(id))?;

    let previous = data.items[index].clone();
    {
        let item = &mut data.items[index];
        if let Some(name) = name {
            item.name = name;
        }
        if let Some(description) = update.description {
            item.description = Some(description);
        }
        item.updated_at = now();
    }

    if let Err(e) = store.persist(&data) {
        data.items[index] = previous;
        return Err(e);
    }

    tracing::debug!(item_id = id, "Item updated");
    Ok(data.items[index].clone())
}

/// Remove an item
pub fn delete_item(store: &ItemStore, id: u64) -> StoreResult<()> {
    let mut data = store.data.write();
    let index = data
        .items
        .iter()
        .position(|i| i.id == id)
        .ok_or(StoreError::NotFound(id))?;

    let removed = data.items.remove(index);
    if let Err(e) = store.persist(&data) {
        data.items.insert(index, removed);
        return Err(e);
    }

    tracing::debug!(item_id = id, "Item deleted");
    Ok(())
}
