//! Item store - the local data file that snapshots capture
//!
//! Items live in memory behind a short-held lock and are written back to a
//! single JSON file after every mutation. The write is atomic, so the
//! backup scheduler can copy the file at any moment and get a consistent
//! snapshot.

mod crud;
mod query;

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DashboardData, Item, ItemCreate, ItemUpdate};
use crate::utils::{atomic_copy, atomic_write, AtomicError};

/// Name reported for the single item table in status output
pub const ITEMS_TABLE: &str = "items";

/// Number of items shown in the dashboard's recent list
pub const RECENT_ITEMS_LIMIT: usize = 10;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the item store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item {0} not found")]
    NotFound(u64),

    #[error("Invalid item: {0}")]
    Invalid(String),

    #[error("No fields to update")]
    EmptyUpdate,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Atomic(#[from] AtomicError),
}

/// On-disk layout of the store file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreData {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub items: Vec<Item>,
}

fn first_id() -> u64 {
    1
}

/// Per-table record counts and file size, for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub database_size_mib: f64,
    pub tables: std::collections::BTreeMap<String, usize>,
}

/// File-backed item store
pub struct ItemStore {
    path: PathBuf,
    pub(crate) data: RwLock<StoreData>,
}

impl ItemStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = Self::load_from_file(&path)?;
        tracing::info!(path = %path.display(), items = data.items.len(), "Item store opened");

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replace the store with the contents of `source`
    ///
    /// The source is parsed before anything is touched, so a corrupt
    /// snapshot leaves the local store as it was. Returns the new item count.
    pub fn restore_from(&self, source: &Path) -> StoreResult<usize> {
        let fresh = Self::load_from_file(source)?;
        let count = fresh.items.len();

        let mut data = self.data.write();
        atomic_copy(source, &self.path)?;
        *data = fresh;
        drop(data);

        tracing::info!(path = %self.path.display(), items = count, "Item store replaced from snapshot");
        Ok(count)
    }

    /// Write the current state to disk, creating the file if needed
    pub fn flush(&self) -> StoreResult<()> {
        let data = self.data.read();
        self.persist(&data)
    }

    fn load_from_file(path: &Path) -> StoreResult<StoreData> {
        if !path.exists() {
            return Ok(StoreData {
                next_id: first_id(),
                items: Vec::new(),
            });
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(StoreData {
                next_id: first_id(),
                items: Vec::new(),
            });
        }

        let mut data: StoreData = serde_json::from_str(&content)?;
        // Never hand out an id that is already taken
        let max_id = data.items.iter().map(|i| i.id).max().unwrap_or(0);
        if data.next_id <= max_id {
            data.next_id = max_id + 1;
        }
        Ok(data)
    }

    /// Persist state to disk (caller holds the lock)
    pub(crate) fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        atomic_write(&self.path, &bytes)?;
        Ok(())
    }

    /// Size of the backing file in bytes (0 when missing)
    pub fn file_size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

// Operations live in submodules, exposed as methods here
impl ItemStore {
    pub fn create(&self, item: ItemCreate) -> StoreResult<Item> {
        crud::create_item(self, item)
    }

    pub fn update(&self, id: u64, update: ItemUpdate) -> StoreResult<Item> {
        crud::update_item(self, id, update)
    }

    pub fn delete(&self, id: u64) -> StoreResult<()> {
        crud::delete_item(self, id)
    }

    pub fn list(&self) -> Vec<Item> {
        query::list_items(self)
    }

    pub fn get(&self, id: u64) -> StoreResult<Item> {
        query::get_item(self, id)
    }

    pub fn count(&self) -> usize {
        self.data.read().items.len()
    }

    pub fn dashboard_data(&self) -> DashboardData {
        query::dashboard_data(self, RECENT_ITEMS_LIMIT)
    }

    pub fn stats(&self) -> StoreStats {
        query::stats(self)
    }
}
