//! Time and identity helpers

use chrono::{DateTime, Utc};
use std::env;
use std::time::Duration;

/// Current wall-clock time
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a std duration into a chrono duration, saturating on overflow
pub fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Owner name used to address remote snapshots
///
/// Resolution order: `CONNECT_USERNAME`, then the OS user, then
/// `default_user`.
pub fn get_current_user() -> String {
    env::var("CONNECT_USERNAME")
        .or_else(|_| env::var("USER")) // Linux/Mac
        .or_else(|_| env::var("USERNAME")) // Windows
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "default_user".to_string())
}

/// Format a timestamp the way the dashboard lists show it
pub fn format_short(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
