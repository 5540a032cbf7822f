//! Runtime configuration read from the environment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::backup::SchedulerConfig;
use crate::broadcast::BroadcasterConfig;
use crate::utils::get_current_user;

/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Snapshot series name under the board root
pub const BACKUP_SERIES: &str = "livedash-database";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    /// Snapshot board root; `None` disables backup and restore
    pub backup_dir: Option<PathBuf>,
    /// Snapshot series, e.g. `alice/livedash-database`
    pub backup_name: String,
    /// Snapshot versions retained on the board
    pub backup_keep: usize,
    pub cache_ttl: Duration,
    pub broadcaster: BroadcasterConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            db_path: PathBuf::from("data").join("database.json"),
            backup_dir: None,
            backup_name: format!("{}/{}", get_current_user(), BACKUP_SERIES),
            backup_keep: 5,
            cache_ttl: Duration::from_secs(10),
            broadcaster: BroadcasterConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable values keep the default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = parsed(&lookup, "LIVEDASH_BIND") {
            config.bind = bind;
        }
        if let Some(path) = lookup("LIVEDASH_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("LIVEDASH_BACKUP_DIR").filter(|d| !d.is_empty()) {
            config.backup_dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup("LIVEDASH_BACKUP_NAME").filter(|n| !n.is_empty()) {
            config.backup_name = name;
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "LIVEDASH_BACKUP_INTERVAL_SECS") {
            config.scheduler.min_interval = Duration::from_secs(secs);
        }
        if let Some(keep) = parsed::<usize, _>(&lookup, "LIVEDASH_BACKUP_KEEP") {
            config.backup_keep = keep.max(1);
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "LIVEDASH_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }

        config
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}
