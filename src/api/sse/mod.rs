//! Server-Sent Events subscriber endpoint
//!
//! `GET /sse/dashboard` is the second subscriber kind: the same payloads as
//! the WebSocket, as `data_change` events after a `connected` event.

pub mod handler;

pub use handler::sse_handler;
