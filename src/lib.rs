//! livedash - item CRUD service with a live dashboard feed
//!
//! Two background mechanisms sit behind a thin HTTP surface:
//!
//! - A rate-limited, queue-coalescing notification broadcaster. Write
//!   paths enqueue and return; one dispatcher task delivers to every
//!   connected dashboard at most once per second.
//! - A change-tracked, time-gated snapshot scheduler that exports the item
//!   store to external storage at most once per interval, and only when it
//!   changed.
//!
//! # Modules
//!
//! - `broadcast`: notification queue, rate window, subscribers, dispatcher
//! - `backup`: snapshot transport and backup/restore scheduler
//! - `store`: file-backed item store
//! - `cache`: TTL cache for rendered dashboard fragments
//! - `api`: REST, WebSocket and SSE endpoints
//! - `server`: startup and shutdown sequence
//! - `config`: environment configuration
//!
//! # Example
//!
//! ```no_run
//! use livedash::{Config, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), livedash::server::ServerError> {
//!     let server = Server::build(Config::from_env()).await?;
//!     server.run().await
//! }
//! ```

pub mod api;
pub mod backup;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use backup::{BackupScheduler, FsBoard, SchedulerConfig, SnapshotTransport};
pub use broadcast::{Broadcaster, BroadcasterConfig, NotificationEvent, SubscriberSink};
pub use cache::TtlCache;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::Server;
pub use store::ItemStore;
pub use types::{Item, ItemCreate, ItemUpdate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
