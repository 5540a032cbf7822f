//! HTTP surface: REST, WebSocket and SSE endpoints
//!
//! Handlers are thin. Item writes go through [`state::AppState::record_change`],
//! which invalidates the dashboard cache and queues the notification and
//! backup check.

pub mod http;
pub mod rest;
pub mod sse;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use state::AppState;
