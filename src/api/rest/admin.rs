//! Backup administration endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;

use crate::api::state::AppState;
use crate::backup::{
    BackupReason, BackupResult, BackupStatus, RemoteSnapshot, RestoreReason, RestoreResult,
};
use crate::error::AppResult;

/// Envelope shared by the admin endpoints
#[derive(Debug, Serialize)]
pub struct AdminResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct BackupBody {
    pub result: BackupResult,
}

#[derive(Debug, Serialize)]
pub struct RestoreBody {
    pub result: RestoreResult,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: BackupStatus,
}

#[derive(Debug, Serialize)]
pub struct InfoBody {
    pub backup_info: Option<RemoteSnapshot>,
}

/// POST /admin/backup-database - Forced backup
pub async fn backup_database(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.scheduler.maybe_backup(true).await;

    let (status, message) = match result.reason {
        _ if result.performed => (StatusCode::OK, "Database backup completed successfully"),
        BackupReason::AlreadyInProgress => {
            (StatusCode::CONFLICT, "Backup skipped, another operation is in progress")
        }
        BackupReason::TransportUnavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "Backup storage is not configured")
        }
        _ => (StatusCode::OK, "Database backup failed - check logs for details"),
    };

    let body = AdminResponse {
        success: result.performed,
        message: message.to_string(),
        data: BackupBody { result },
    };
    (status, Json(body))
}

/// POST /admin/restore-database - Replace the local store with the latest snapshot
pub async fn restore_database(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.scheduler.restore_latest().await;

    if result.restored {
        state.record_restore(json!({"items": result.items}));
    }

    let status = match result.reason {
        RestoreReason::AlreadyInProgress => StatusCode::CONFLICT,
        RestoreReason::TransportUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    let message = if result.restored {
        "Database restored successfully from backup"
    } else {
        "Database restore failed - check logs for details"
    };

    let body = AdminResponse {
        success: result.restored,
        message: message.to_string(),
        data: RestoreBody { result },
    };
    (status, Json(body))
}

/// GET /admin/backup-status
pub async fn backup_status(State(state): State<Arc<AppState>>) -> Json<AdminResponse<StatusBody>> {
    Json(AdminResponse {
        success: true,
        message: "Backup status retrieved".to_string(),
        data: StatusBody {
            status: state.scheduler.status(),
        },
    })
}

/// GET /admin/backup-info - Metadata of the latest snapshot
pub async fn backup_info(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<AdminResponse<InfoBody>>> {
    let latest = state.scheduler.backup_info().await?;
    let message = if latest.is_some() {
        "Latest backup found"
    } else {
        "No backup information available"
    };

    Ok(Json(AdminResponse {
        success: latest.is_some(),
        message: message.to_string(),
        data: InfoBody {
            backup_info: latest,
        },
    }))
}
