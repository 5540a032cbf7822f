//! WebSocket subscriber endpoint
//!
//! `GET /ws/dashboard` registers the connection with the broadcaster and
//! forwards every dashboard message as a text frame. The first frame is a
//! `connected` welcome carrying the subscriber id and current sequence id.

pub mod handler;

pub use handler::ws_handler;
