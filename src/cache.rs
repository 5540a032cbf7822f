//! Read-through TTL cache for dashboard fragments
//!
//! Entries expire after their TTL and are removed lazily on `get`. Write
//! paths call [`TtlCache::invalidate`] before they return, so a read that
//! follows a write never sees the pre-write fragment. Every invalidation
//! bumps an epoch; a read-through load that overlapped one is returned to
//! its caller but not cached.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// Cache key for the item-count fragment
pub const DASHBOARD_STATS_KEY: &str = "dashboard_stats";

/// Cache key for the recent-items fragment
pub const DASHBOARD_ITEMS_KEY: &str = "dashboard_items";

/// Keys touched by any item write
pub const DASHBOARD_KEYS: [&str; 2] = [DASHBOARD_STATS_KEY, DASHBOARD_ITEMS_KEY];

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Entry counts for the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Bumped by every invalidation
    epoch: u64,
}

/// Thread-safe in-memory cache with per-entry expiry
pub struct TtlCache<V> {
    state: Mutex<CacheState<V>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                epoch: 0,
            }),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Value for `key` unless missing or expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.state.lock();
        match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` for the default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.state.lock().entries.insert(key.into(), entry);
    }

    /// Cached value, or compute it with `load` and cache the result
    ///
    /// `load` runs without the lock. If an invalidation lands while it runs,
    /// the loaded value may predate that write and is not cached.
    pub fn get_or_insert_with<F>(&self, key: &str, load: F) -> V
    where
        F: FnOnce() -> V,
    {
        let epoch = {
            let state = self.state.lock();
            let now = Instant::now();
            match state.entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return entry.value.clone(),
                _ => state.epoch,
            }
        };

        let value = load();

        let mut state = self.state.lock();
        if state.epoch == epoch {
            let entry = CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + self.default_ttl,
            };
            state.entries.insert(key.to_string(), entry);
        } else {
            tracing::trace!(key, "Cache invalidated during load, not storing");
        }
        value
    }

    pub fn invalidate(&self, key: &str) {
        self.invalidate_many(&[key]);
    }

    pub fn invalidate_many(&self, keys: &[&str]) {
        let mut state = self.state.lock();
        state.epoch += 1;
        for key in keys {
            state.entries.remove(*key);
        }
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let state = self.state.lock();
        let total_entries = state.entries.len();
        let expired_entries = state
            .entries
            .values().filter(|e| e.is_expired(now)).count();
        CacheStats {
            total_entries,
            expired_entries,
            active_entries: total_entries - expired_entries,
        }
    }
}
