//! HTTP server setup with Axum

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::rest::{admin, dashboard, items};
use super::sse::sse_handler;
use super::state::AppState;
use super::websocket::ws_handler;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for the dashboard
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Live subscribers
        .route("/ws/dashboard", get(ws_handler))
        .route("/sse/dashboard", get(sse_handler))
        .route("/test-websocket", get(dashboard::test_websocket))
        // Item CRUD
        .route("/api/v1/items", get(items::list_items).post(items::create_item))
        .route(
            "/api/v1/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        // Dashboard reads
        .route("/dashboard-stats", get(dashboard::dashboard_stats))
        .route("/dashboard-items", get(dashboard::dashboard_items))
        .route("/health", get(dashboard::health_check))
        .route("/status", get(dashboard::status))
        // Backup administration
        .route("/admin/backup-database", post(admin::backup_database))
        .route("/admin/restore-database", post(admin::restore_database))
        .route("/admin/backup-status", get(admin::backup_status))
        .route("/admin/backup-info", get(admin::backup_info))
        .layer(cors)
        .with_state(state)
}
