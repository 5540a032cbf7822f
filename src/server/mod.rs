//! Server lifecycle
//!
//! Startup order:
//!
//! 1. Remove leftover temp files next to the store
//! 2. Open the store; restore the latest snapshot if no local file existed
//! 3. Adopt the last snapshot time from storage
//! 4. Take an initial snapshot of a brand-new store
//! 5. Start the notification dispatcher and the backup timer
//!
//! Shutdown reverses it: stop accepting requests, close subscribers, take a
//! final snapshot of unsaved changes, clear the cache.

use std::io;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::api::{create_router, AppState};
use crate::backup::{BackupScheduler, FsBoard, SnapshotTransport};
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::store::{ItemStore, StoreError};
use crate::utils::cleanup_temp_files;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to open item store: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A fully initialised server, ready to serve
pub struct Server {
    config: Config,
    state: Arc<AppState>,
}

impl Server {
    /// Run the startup sequence
    pub async fn build(config: Config) -> ServerResult<Self> {
        if let Some(dir) = config.db_path.parent() {
            match cleanup_temp_files(dir) {
                Ok(0) => {}
                Ok(cleaned) => tracing::info!(cleaned, "Removed leftover temp files"),
                Err(e) => tracing::warn!(error = %e, "Could not clean temp files"),
            }
        }

        let store_existed = config.db_path.exists();
        let store = Arc::new(ItemStore::open(&config.db_path)?);

        let transport = config.backup_dir.as_ref().map(|dir| {
            tracing::info!(
                board = %dir.display(),
                name = %config.backup_name,
                keep = config.backup_keep,
                "Snapshot storage configured"
            );
            Arc::new(FsBoard::new(dir, config.backup_name.clone(), config.backup_keep))
                as Arc<dyn SnapshotTransport>
        });
        if transport.is_none() {
            tracing::warn!("LIVEDASH_BACKUP_DIR not set, backups disabled");
        }

        let scheduler = Arc::new(BackupScheduler::new(
            config.scheduler.clone(),
            Arc::clone(&store),
            transport,
        ));

        let mut restored = false;
        if store_existed {
            tracing::info!("Local store exists, skipping restore");
        } else {
            tracing::info!("No local store, attempting restore from latest snapshot");
            restored = scheduler.restore_latest().await.restored;
        }

        let remote = scheduler.adopt_remote_timestamp().await;

        if !store_existed && !restored {
            store.flush()?;
            if remote.is_none() {
                tracing::info!("Creating initial snapshot of new store");
                scheduler.maybe_backup(true).await;
            }
        }

        let broadcaster = Arc::new(Broadcaster::new(config.broadcaster.clone()));
        broadcaster.start();
        scheduler.start();

        let state = Arc::new(AppState::new(
            store,
            broadcaster,
            scheduler,
            config.cache_ttl,
        ));

        Ok(Self { config, state })
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state))
    }

    /// Serve until Ctrl+C or SIGTERM, then shut down
    pub async fn run(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind).await?;
        tracing::info!(addr = %self.config.bind, "HTTP server listening");

        let state = Arc::clone(&self.state);
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                // Ends open WebSocket and SSE streams so the drain can finish
                state.broadcaster.shutdown().await;
            })
            .await;

        self.shutdown().await;
        served.map_err(ServerError::from)
    }

    /// Stop background tasks and take the final snapshot
    pub async fn shutdown(&self) {
        self.state.broadcaster.shutdown().await;

        match self.state.scheduler.shutdown().await {
            Some(result) if result.performed => tracing::info!("Final backup completed"),
            Some(result) => tracing::warn!(reason = ?result.reason, "Final backup not performed"),
            None => {}
        }

        self.state.cache.clear();
        tracing::info!("Server stopped");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemCreate;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir, with_backups: bool) -> Config {
        Config {
            db_path: temp_dir.path().join("data").join("db.json"),
            backup_dir: with_backups.then(|| temp_dir.path().join("board")),
            backup_name: "tester/livedash-database".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_start_takes_initial_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let server = Server::build(test_config(&temp_dir, true)).await.unwrap();

        assert!(server.state().store.exists());
        assert!(server.state().scheduler.last_snapshot().is_some());
        assert!(server.state().scheduler.backup_info().await.unwrap().is_some());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_restores_missing_store() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir, true);

        let server = Server::build(config.clone()).await.unwrap();
        server
            .state()
            .store
            .create(ItemCreate {
                name: "Persisted".to_string(),
                description: None,
            })
            .unwrap();
        server.state().scheduler.mark_changed();
        server.shutdown().await;

        std::fs::remove_file(&config.db_path).unwrap();

        let server = Server::build(config).await.unwrap();
        let items = server.state().store.list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Persisted");
        assert!(!server.state().scheduler.is_dirty());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_without_backups() {
        let temp_dir = TempDir::new().unwrap();
        let server = Server::build(test_config(&temp_dir, false)).await.unwrap();

        assert!(server.state().store.exists());
        assert!(server.state().scheduler.last_snapshot().is_none());
        server.shutdown().await;
    }
}
