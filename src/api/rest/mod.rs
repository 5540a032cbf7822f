//! REST API module for HTTP endpoints
//!
//! - `/api/v1/items[/:id]` - item CRUD ([`items`])
//! - `/dashboard-*`, `/health`, `/status`, `/test-websocket` - dashboard reads ([`dashboard`])
//! - `/admin/*` - backup and restore ([`admin`])

pub mod admin;
pub mod dashboard;
pub mod items;

use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "NOT_FOUND".to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "BAD_REQUEST".to_string(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "UNAVAILABLE".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: "INTERNAL_ERROR".to_string(),
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: String,
}

impl Detail {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
