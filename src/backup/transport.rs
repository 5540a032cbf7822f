//! Snapshot transport
//!
//! Moves a snapshot of the local store to external storage and back. The
//! scheduler only knows [`SnapshotTransport`]; [`FsBoard`] is the bundled
//! implementation, a directory tree of versioned snapshots:
//!
//! ```text
//! <root>/<name>/<version>/snapshot.json   payload
//! <root>/<name>/<version>/meta.json       written last; marks the version complete
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::{atomic_copy, atomic_write, AtomicError};

const PAYLOAD_FILE: &str = "snapshot.json";
const META_FILE: &str = "meta.json";
const STAGING_DIR: &str = ".staging";

/// Errors reaching or using external snapshot storage
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Snapshot storage unavailable: {0}")]
    Unavailable(String),

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Local store error: {0}")]
    Source(String),

    #[error("Snapshot task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Atomic(#[from] AtomicError),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Address of one stored snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHandle {
    pub name: String,
    pub version: String,
}

/// Metadata stored next to each snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub backup_time: DateTime<Utc>,
    pub file_size: u64,
    pub description: String,
    #[serde(default)]
    pub last_data_change: Option<DateTime<Utc>>,
}

impl SnapshotMeta {
    pub fn new(
        backup_time: DateTime<Utc>,
        file_size: u64,
        last_data_change: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            backup_time,
            file_size,
            description: "Item store backup".to_string(),
            last_data_change,
        }
    }
}

/// A stored snapshot with its metadata
#[derive(Debug, Clone, Serialize)]
pub struct RemoteSnapshot {
    pub handle: RemoteHandle,
    pub meta: SnapshotMeta,
}

/// External snapshot storage
///
/// Implementations do blocking I/O; the scheduler calls them from a
/// blocking task.
pub trait SnapshotTransport: Send + Sync {
    /// Upload the file at `local_path` as a new snapshot
    fn export(&self, local_path: &Path, meta: &SnapshotMeta) -> TransportResult<RemoteHandle>;

    /// Download a snapshot to a local staging file and return its path
    fn import(&self, handle: &RemoteHandle) -> TransportResult<PathBuf>;

    /// Newest complete snapshot, if any
    fn latest(&self) -> TransportResult<Option<RemoteSnapshot>>;
}

/// Versioned snapshot directory ("board")
pub struct FsBoard {
    root: PathBuf,
    name: String,
    keep: usize,
}

impl FsBoard {
    /// `name` addresses the snapshot series, e.g. `alice/livedash-database`
    pub fn new<P: AsRef<Path>>(root: P, name: impl Into<String>, keep: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            name: name.into(),
            keep: keep.max(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn series_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn version_dir(&self, version: &str) -> PathBuf {
        self.series_dir().join(version)
    }

    fn new_version(&self, backup_time: &DateTime<Utc>) -> String {
        let base = backup_time.format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut version = base.clone();
        let mut n = 1;
        while self.version_dir(&version).exists() {
            version = format!("{}-{}", base, n);
            n += 1;
        }
        version
    }

    /// Complete versions, oldest first
    fn versions(&self) -> TransportResult<Vec<String>> {
        let dir = self.series_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() && path.join(META_FILE).exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    versions.push(name.to_string());
                }
            }
        }
        versions.sort_by(|a, b| version_order(a).cmp(&version_order(b)));
        Ok(versions)
    }

    fn read_meta(&self, version: &str) -> TransportResult<SnapshotMeta> {
        let content = fs::read_to_string(self.version_dir(version).join(META_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn prune(&self) -> TransportResult<usize> {
        let versions = self.versions()?;
        if versions.len() <= self.keep {
            return Ok(0);
        }

        let excess = versions.len() - self.keep;
        for version in &versions[..excess] {
            fs::remove_dir_all(self.version_dir(version))?;
            tracing::debug!(name = %self.name, version = %version, "Pruned old snapshot");
        }
        Ok(excess)
    }
}

/// Sort key for a version name: timestamp, then numeric collision suffix
fn version_order(version: &str) -> (&str, u64) {
    match version.split_once('-') {
        Some((base, n)) => (base, n.parse().unwrap_or(0)),
        None => (version, 0),
    }
}

impl SnapshotTransport for FsBoard {
    fn export(&self, local_path: &Path, meta: &SnapshotMeta) -> TransportResult<RemoteHandle> {
        if !local_path.exists() {
            return Err(TransportError::Source(format!(
                "{} does not exist",
                local_path.display()
            )));
        }

        let version = self.new_version(&meta.backup_time);
        let dir = self.version_dir(&version);
        fs::create_dir_all(&dir)?;

        let written = (|| -> TransportResult<()> {
            atomic_copy(local_path, dir.join(PAYLOAD_FILE))?;
            atomic_write(dir.join(META_FILE), &serde_json::to_vec_pretty(meta)?)?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }

        if let Err(e) = self.prune() {
            tracing::warn!(name = %self.name, error = %e, "Failed to prune old snapshots");
        }

        Ok(RemoteHandle {
            name: self.name.clone(),
            version,
        })
    }

    fn import(&self, handle: &RemoteHandle) -> TransportResult<PathBuf> {
        if handle.name != self.name {
            return Err(TransportError::NotFound(format!(
                "{} is not stored on this board",
                handle.name
            )));
        }

        let payload = self.version_dir(&handle.version).join(PAYLOAD_FILE);
        if !payload.exists() {
            return Err(TransportError::NotFound(format!(
                "{}@{}",
                handle.name, handle.version
            )));
        }

        let staged = self
            .root
            .join(STAGING_DIR)
            .join(format!("{}-{}", handle.version, PAYLOAD_FILE));
        atomic_copy(&payload, &staged)?;
        Ok(staged)
    }

    fn latest(&self) -> TransportResult<Option<RemoteSnapshot>> {
        let Some(version) = self.versions()?.pop() else {
            return Ok(None);
        };
        let meta = self.read_meta(&version)?;
        Ok(Some(RemoteSnapshot {
            handle: RemoteHandle {
                name: self.name.clone(),
                version,
            },
            meta,
        }))
    }
}
