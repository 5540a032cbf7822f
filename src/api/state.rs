//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::backup::BackupScheduler;
use crate::broadcast::{Broadcaster, NotificationEvent};
use crate::cache::{TtlCache, DASHBOARD_KEYS};
use crate::store::ItemStore;

/// Handles passed to every route
pub struct AppState {
    pub store: Arc<ItemStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub scheduler: Arc<BackupScheduler>,
    /// Rendered dashboard fragments
    pub cache: TtlCache<String>,
}

impl AppState {
    pub fn new(
        store: Arc<ItemStore>,
        broadcaster: Arc<Broadcaster>,
        scheduler: Arc<BackupScheduler>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            broadcaster,
            scheduler,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Side effects of a successful item write
    ///
    /// The cache is invalidated before the handler returns; the notification
    /// and backup check are only queued.
    pub fn record_change(&self, change_type: &str, details: Value) {
        self.cache.invalidate_many(&DASHBOARD_KEYS);
        self.scheduler.mark_changed();
        self.broadcaster
            .notify(NotificationEvent::data_changed(change_type, details));
        self.scheduler.request_check();
    }

    /// Side effects of a restore; the store now matches the snapshot, so
    /// nothing is marked dirty
    pub fn record_restore(&self, details: Value) {
        self.cache.invalidate_many(&DASHBOARD_KEYS);
        self.broadcaster
            .notify(NotificationEvent::data_changed("database_restored", details));
    }

    /// Get the current sequence ID
    pub fn current_sequence_id(&self) -> u64 {
        self.broadcaster.current_sequence_id()
    }
}
