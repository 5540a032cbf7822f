//! Dashboard fragments and service status

use std::sync::Arc;

use axum::{extract::State, response::Html, Json};
use serde::Serialize;
use serde_json::json;

use crate::api::state::AppState;
use crate::broadcast::{BroadcastStats, EventKind, NotificationEvent};
use crate::cache::{CacheStats, DASHBOARD_ITEMS_KEY, DASHBOARD_STATS_KEY};
use crate::store::StoreStats;
use crate::types::Item;
use crate::utils::format_short;

/// Descriptions longer than this are cut in the recent-items list
const DESCRIPTION_PREVIEW_CHARS: usize = 60;

/// GET /dashboard-stats - Item count card (cached)
pub async fn dashboard_stats(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.cache.get_or_insert_with(DASHBOARD_STATS_KEY, || {
        render_stats(state.store.count())
    }))
}

/// GET /dashboard-items - Recent items list (cached)
pub async fn dashboard_items(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.cache.get_or_insert_with(DASHBOARD_ITEMS_KEY, || {
        render_items(&state.store.dashboard_data().recent_items)
    }))
}

/// GET /health
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

/// Response for GET /status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub store: StoreStats,
    pub notifications: BroadcastStats,
    pub cache: CacheStats,
}

/// GET /status - Store size, table counts and live counters
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        store: state.store.stats(),
        notifications: state.broadcaster.stats(),
        cache: state.cache.stats(),
    })
}

/// GET /test-websocket - Queue a manual test notification
pub async fn test_websocket(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.broadcaster.notify(NotificationEvent::new(
        EventKind::Test,
        "test_notification",
        json!({"message": "Manual test"}),
    ));
    Json(json!({"status": "notification sent"}))
}

fn render_stats(total_items: usize) -> String {
    format!(
        r#"<div class="stat-card"><div class="stat-number">{total_items}</div><div class="stat-label">Total Items</div></div>"#
    )
}

fn render_items(items: &[Item]) -> String {
    if items.is_empty() {
        return r#"<div class="empty-state"><p>No items found</p><p>Create your first item using the API!</p></div>"#
            .to_string();
    }

    items
        .iter()
        .map(|item| {
            let description = item
                .description
                .as_deref()
                .map(preview)
                .unwrap_or_else(|| "No description".to_string());
            format!(
                r#"<div class="item"><div class="item-info"><div class="item-name">{}</div><div class="item-description">{}</div></div><div class="item-meta"><div class="item-id">ID: {}</div><div>{}</div></div></div>"#,
                escape_html(&item.name),
                escape_html(&description),
                item.id,
                format_short(&item.created_at),
            )
        })
        .collect()
}

fn preview(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        let cut: String = text.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
