//! Item endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;

use super::Detail;
use crate::api::state::AppState;
use crate::error::AppResult;
use crate::types::{Item, ItemCreate, ItemUpdate};

/// GET /api/v1/items - All items, newest first
pub async fn list_items(State(state): State<Arc<AppState>>) -> Json<Vec<Item>> {
    Json(state.store.list())
}

/// GET /api/v1/items/:id
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> AppResult<Json<Item>> {
    Ok(Json(state.store.get(id)?))
}

/// POST /api/v1/items
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ItemCreate>,
) -> AppResult<Json<Item>> {
    let item = state.store.create(body)?;
    tracing::info!(item_id = item.id, "Item created");
    state.record_change("item_created", json!({"item_id": item.id, "name": item.name}));
    Ok(Json(item))
}

/// PUT /api/v1/items/:id - Partial update
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(body): Json<ItemUpdate>,
) -> AppResult<Json<Item>> {
    let item = state.store.update(id, body)?;
    tracing::info!(item_id = id, "Item updated");
    state.record_change("item_updated", json!({"item_id": id}));
    Ok(Json(item))
}

/// DELETE /api/v1/items/:id
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> AppResult<Json<Detail>> {
    state.store.delete(id)?;
    tracing::info!(item_id = id, "Item deleted");
    state.record_change("item_deleted", json!({"item_id": id}));
    Ok(Json(Detail::new("Item deleted successfully")))
}
