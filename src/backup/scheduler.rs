//! Snapshot backup scheduler
//!
//! Tracks whether the store changed since the last snapshot and decides
//! when to export a new one. Exports and restores run one at a time; a
//! trigger that arrives mid-operation is reported as skipped.
//!
//! ```text
//! IDLE ──(dirty & interval elapsed, or forced)──► EXPORTING
//!   ▲                                                │
//!   └──── success: flag cleared / failure: kept ─────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::transport::{
    RemoteHandle, RemoteSnapshot, SnapshotMeta, SnapshotTransport, TransportError,
};
use crate::store::ItemStore;
use crate::utils::time::{now, to_chrono};

/// Tuning for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum time between automatic snapshots
    pub min_interval: Duration,
    /// Cadence of the background check
    pub check_interval: Duration,
    /// Bound on the final backup during shutdown
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(60 * 60),
            check_interval: Duration::from_secs(5 * 60),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Why a backup did or did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupReason {
    /// Exported on explicit request
    Forced,
    /// Exported because the store was dirty and the interval had elapsed
    Due,
    /// Skipped: nothing changed since the last snapshot
    NotDirty,
    /// Skipped: the last snapshot is too recent
    IntervalNotElapsed,
    /// Skipped: another backup or restore is running
    AlreadyInProgress,
    /// Skipped: no snapshot storage configured
    TransportUnavailable,
    /// The export itself failed
    Error,
}

/// Outcome of [`BackupScheduler::maybe_backup`]
#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub performed: bool,
    pub reason: BackupReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<RemoteHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupResult {
    fn skipped(reason: BackupReason) -> Self {
        Self {
            performed: false,
            reason,
            handle: None,
            error: None,
        }
    }

    fn performed(reason: BackupReason, handle: RemoteHandle) -> Self {
        Self {
            performed: true,
            reason,
            handle: Some(handle),
            error: None,
        }
    }

    fn failed(error: &TransportError) -> Self {
        Self {
            performed: false,
            reason: BackupReason::Error,
            handle: None,
            error: Some(error.to_string()),
        }
    }
}

/// Why a restore did or did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreReason {
    Restored,
    NoSnapshot,
    AlreadyInProgress,
    TransportUnavailable,
    Error,
}

/// Outcome of [`BackupScheduler::restore_latest`]
#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub restored: bool,
    pub reason: RestoreReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<RemoteSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoreResult {
    fn skipped(reason: RestoreReason) -> Self {
        Self {
            restored: false,
            reason,
            snapshot: None,
            items: None,
            error: None,
        }
    }
}

/// Snapshot-side operation currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Backup,
    Restore,
}

/// Point-in-time view for the admin status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct BackupStatus {
    pub dirty: bool,
    pub pending_changes: u64,
    pub last_snapshot: Option<DateTime<Utc>>,
    pub last_data_change: Option<DateTime<Utc>>,
    pub next_eligible: DateTime<Utc>,
    pub in_progress: bool,
    pub operation: Option<Operation>,
    pub backup_due: bool,
    pub backup_interval_secs: u64,
    pub transport_available: bool,
    pub database_exists: bool,
    pub database_size: u64,
    pub last_error: Option<String>,
}

/// ChangeFlag + SnapshotRecord
///
/// The flag is a pair of counters rather than a bool: a write that lands
/// while an export is running bumps `changes` past the value the export
/// captured, so the store stays dirty after that export succeeds.
#[derive(Debug, Default)]
struct SnapshotState {
    changes: u64,
    snapshot_changes: u64,
    last_change: Option<DateTime<Utc>>,
    last_snapshot: Option<DateTime<Utc>>,
    in_progress: Option<Operation>,
    last_error: Option<String>,
}

impl SnapshotState {
    fn dirty(&self) -> bool {
        self.changes != self.snapshot_changes
    }

    fn interval_elapsed(&self, now: DateTime<Utc>, min_interval: chrono::Duration) -> bool {
        match self.last_snapshot {
            Some(last) => now - last >= min_interval,
            None => true,
        }
    }
}

/// Clears the in-progress marker when an operation ends or is cancelled
struct InProgressGuard<'a> {
    state: &'a Mutex<SnapshotState>,
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_progress = None;
    }
}

/// Change-tracked, time-gated backup scheduler
pub struct BackupScheduler {
    config: SchedulerConfig,
    store: Arc<ItemStore>,
    transport: Option<Arc<dyn SnapshotTransport>>,
    state: Mutex<SnapshotState>,
    wake: Notify,
    shutdown: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl BackupScheduler {
    /// `transport = None` disables backup and restore; both then report
    /// `transport_unavailable`
    pub fn new(
        config: SchedulerConfig,
        store: Arc<ItemStore>,
        transport: Option<Arc<dyn SnapshotTransport>>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            state: Mutex::new(SnapshotState::default()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            timer: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn transport_available(&self) -> bool {
        self.transport.is_some()
    }

    /// Record that the store changed; called by every write
    pub fn mark_changed(&self) {
        let mut state = self.state.lock();
        state.changes += 1;
        state.last_change = Some(now());
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty()
    }

    pub fn last_snapshot(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_snapshot
    }

    /// Override the last snapshot time, e.g. from remote metadata
    pub fn set_last_snapshot(&self, at: DateTime<Utc>) {
        self.state.lock().last_snapshot = Some(at);
    }

    /// Ask the background task to run a check soon
    ///
    /// Cheap and non-blocking; the write path uses it instead of running
    /// `maybe_backup` itself.
    pub fn request_check(&self) {
        self.wake.notify_one();
    }

    /// Export a snapshot if due, or unconditionally when `force` is set
    pub async fn maybe_backup(&self, force: bool) -> BackupResult {
        let started = now();
        let min_interval = to_chrono(self.config.min_interval);

        let (transport, captured_changes, last_change) = {
            let mut state = self.state.lock();
            if state.in_progress.is_some() {
                tracing::debug!("Backup skipped, operation already in progress");
                return BackupResult::skipped(BackupReason::AlreadyInProgress);
            }
            if !force {
                if !state.dirty() {
                    tracing::trace!("Backup skipped, no changes");
                    return BackupResult::skipped(BackupReason::NotDirty);
                }
                if !state.interval_elapsed(started, min_interval) {
                    tracing::trace!("Backup skipped, interval not elapsed");
                    return BackupResult::skipped(BackupReason::IntervalNotElapsed);
                }
            }
            let Some(transport) = self.transport.clone() else {
                tracing::warn!("Snapshot storage not configured, skipping backup");
                return BackupResult::skipped(BackupReason::TransportUnavailable);
            };
            state.in_progress = Some(Operation::Backup);
            (transport, state.changes, state.last_change)
        };
        let _guard = InProgressGuard { state: &self.state };

        let reason = if force {
            BackupReason::Forced
        } else {
            BackupReason::Due
        };

        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(move || -> Result<RemoteHandle, TransportError> {
            store
                .flush()
                .map_err(|e| TransportError::Source(e.to_string()))?;
            let meta = SnapshotMeta::new(started, store.file_size(), last_change);
            transport.export(store.path(), &meta)
        })
        .await
        .unwrap_or_else(|e| Err(TransportError::Task(e.to_string())));

        let mut state = self.state.lock();
        match outcome {
            Ok(handle) => {
                state.snapshot_changes = captured_changes;
                state.last_snapshot = Some(started);
                state.last_error = None;
                tracing::info!(
                    ?reason,
                    version = %handle.version,
                    still_dirty = state.dirty(),
                    "Snapshot exported"
                );
                BackupResult::performed(reason, handle)
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                tracing::error!(?reason, error = %e, "Snapshot export failed");
                BackupResult::failed(&e)
            }
        }
    }

    /// Overwrite the local store with the newest external snapshot
    ///
    /// Meant for startup or an explicit admin action. Any failure leaves the
    /// local store untouched.
    pub async fn restore_latest(&self) -> RestoreResult {
        let transport = {
            let mut state = self.state.lock();
            if state.in_progress.is_some() {
                tracing::debug!("Restore skipped, operation already in progress");
                return RestoreResult::skipped(RestoreReason::AlreadyInProgress);
            }
            let Some(transport) = self.transport.clone() else {
                tracing::warn!("Snapshot storage not configured, skipping restore");
                return RestoreResult::skipped(RestoreReason::TransportUnavailable);
            };
            state.in_progress = Some(Operation::Restore);
            transport
        };
        let _guard = InProgressGuard { state: &self.state };

        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(
            move || -> Result<Option<(RemoteSnapshot, usize)>, TransportError> {
                let Some(latest) = transport.latest()? else {
                    return Ok(None);
                };
                let staged = transport.import(&latest.handle)?;
                let restored = store
                    .restore_from(&staged)
                    .map_err(|e| TransportError::Source(e.to_string()));
                let _ = std::fs::remove_file(&staged);
                Ok(Some((latest, restored?)))
            },
        )
        .await
        .unwrap_or_else(|e| Err(TransportError::Task(e.to_string())));

        let mut state = self.state.lock();
        match outcome {
            Ok(Some((snapshot, items))) => {
                // Local store now equals the snapshot
                state.snapshot_changes = state.changes;
                state.last_snapshot = Some(snapshot.meta.backup_time);
                state.last_error = None;
                tracing::info!(
                    version = %snapshot.handle.version,
                    items,
                    "Store restored from snapshot"
                );
                RestoreResult {
                    restored: true,
                    reason: RestoreReason::Restored,
                    snapshot: Some(snapshot),
                    items: Some(items),
                    error: None,
                }
            }
            Ok(None) => {
                tracing::info!("No snapshot available to restore");
                RestoreResult::skipped(RestoreReason::NoSnapshot)
            }
            Err(e) => {
                state.last_error = Some(e.to_string());
                tracing::warn!(error = %e, "Could not restore snapshot");
                RestoreResult {
                    error: Some(e.to_string()),
                    ..RestoreResult::skipped(RestoreReason::Error)
                }
            }
        }
    }

    /// Metadata of the newest external snapshot
    pub async fn backup_info(&self) -> Result<Option<RemoteSnapshot>, TransportError> {
        let transport = self
            .transport
            .clone()
            .ok_or_else(|| TransportError::Unavailable("no snapshot storage configured".to_string()))?;
        tokio::task::spawn_blocking(move || transport.latest())
            .await
            .unwrap_or_else(|e| Err(TransportError::Task(e.to_string())))
    }

    /// Initialise lastSnapshot from the newest external snapshot
    ///
    /// Keeps a restarted process from exporting again right away when a
    /// recent snapshot already exists.
    pub async fn adopt_remote_timestamp(&self) -> Option<DateTime<Utc>> {
        match self.backup_info().await {
            Ok(Some(snapshot)) => {
                let backup_time = snapshot.meta.backup_time;
                let mut state = self.state.lock();
                if state.last_snapshot.map_or(true, |last| last < backup_time) {
                    state.last_snapshot = Some(backup_time);
                }
                tracing::info!(%backup_time, "Adopted last snapshot time from storage");
                Some(backup_time)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::info!(error = %e, "No snapshot metadata available");
                None
            }
        }
    }

    pub fn status(&self) -> BackupStatus {
        let current = now();
        let min_interval = to_chrono(self.config.min_interval);
        let state = self.state.lock();
        let dirty = state.dirty();

        let next_eligible = match state.last_snapshot {
            Some(last) => last
                .checked_add_signed(min_interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => current,
        };

        BackupStatus {
            dirty,
            pending_changes: state.changes - state.snapshot_changes,
            last_snapshot: state.last_snapshot,
            last_data_change: state.last_change,
            next_eligible,
            in_progress: state.in_progress.is_some(),
            operation: state.in_progress,
            backup_due: dirty && state.interval_elapsed(current, min_interval),
            backup_interval_secs: self.config.min_interval.as_secs(),
            transport_available: self.transport.is_some(),
            database_exists: self.store.exists(),
            database_size: self.store.file_size(),
            last_error: state.last_error.clone(),
        }
    }

    /// Spawn the periodic check; calling it again is a no-op
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.timer.lock();
        if slot.is_some() || self.shutdown.is_cancelled() {
            return;
        }

        let scheduler = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let cadence = self.config.check_interval;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = scheduler.wake.notified() => {}
                }

                let result = scheduler.maybe_backup(false).await;
                if result.performed {
                    tracing::info!("Scheduled backup completed");
                }
            }
            tracing::debug!("Backup timer stopped");
        }));

        tracing::info!(
            check_interval_secs = cadence.as_secs(),
            min_interval_secs = self.config.min_interval.as_secs(),
            "Backup timer started"
        );
    }

    /// Stop the timer and take a final snapshot of unsaved changes
    ///
    /// The final export is forced when the store is dirty, so a change that
    /// was not yet due is not lost. It is abandoned after the configured
    /// timeout.
    pub async fn shutdown(&self) -> Option<BackupResult> {
        self.shutdown.cancel();

        let handle = self.timer.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(self.config.shutdown_timeout, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("Backup timer did not stop in time, aborting");
                handle.abort();
            }
        }

        if !self.is_dirty() {
            tracing::info!("No unsaved changes at shutdown");
            return None;
        }

        tracing::info!("Performing final backup before shutdown");
        match tokio::time::timeout(self.config.shutdown_timeout, self.maybe_backup(true)).await {
            Ok(result) => Some(result),
            Err(_) => {
                tracing::warn!("Final backup timed out, abandoning");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemCreate;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// In-memory transport that records exports and can be told to fail
    #[derive(Default)]
    struct RecordingTransport {
        exports: AtomicUsize,
        fail: AtomicBool,
    }

    impl SnapshotTransport for RecordingTransport {
        fn export(&self, local_path: &Path, _meta: &SnapshotMeta) -> Result<RemoteHandle, TransportError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Unavailable("connection refused".to_string()));
            }
            assert!(local_path.exists());
            let n = self.exports.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteHandle {
                name: "test".to_string(),
                version: n.to_string(),
            })
        }

        fn import(&self, handle: &RemoteHandle) -> Result<PathBuf, TransportError> {
            Err(TransportError::NotFound(handle.version.clone()))
        }

        fn latest(&self) -> Result<Option<RemoteSnapshot>, TransportError> {
            Ok(None)
        }
    }

    fn setup() -> (BackupScheduler, Arc<RecordingTransport>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(ItemStore::open(temp_dir.path().join("db.json")).unwrap());
        let transport = Arc::new(RecordingTransport::default());
        let scheduler = BackupScheduler::new(
            SchedulerConfig::default(),
            store,
            Some(transport.clone() as Arc<dyn SnapshotTransport>),
        );
        (scheduler, transport, temp_dir)
    }

    #[tokio::test]
    async fn test_clean_store_is_noop_even_when_interval_elapsed() {
        let (scheduler, transport, _temp_dir) = setup();
        scheduler.set_last_snapshot(now() - chrono::Duration::days(3));

        let result = scheduler.maybe_backup(false).await;

        assert!(!result.performed);
        assert_eq!(result.reason, BackupReason::NotDirty);
        assert_eq!(transport.exports.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dirty_store_waits_for_interval() {
        let (scheduler, transport, _temp_dir) = setup();
        scheduler.set_last_snapshot(now() - chrono::Duration::minutes(1));
        scheduler.mark_changed();

        let result = scheduler.maybe_backup(false).await;

        assert!(!result.performed);
        assert_eq!(result.reason, BackupReason::IntervalNotElapsed);
        assert!(scheduler.is_dirty());
        assert_eq!(transport.exports.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_ignores_flag_and_interval() {
        let (scheduler, transport, _temp_dir) = setup();
        scheduler.set_last_snapshot(now());

        let result = scheduler.maybe_backup(true).await;

        assert!(result.performed);
        assert_eq!(result.reason, BackupReason::Forced);
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_backup_due_without_prior_snapshot() {
        let (scheduler, _transport, _temp_dir) = setup();
        scheduler.mark_changed();

        let result = scheduler.maybe_backup(false).await;
        assert!(result.performed);
        assert_eq!(result.reason, BackupReason::Due);
    }

    #[tokio::test]
    async fn test_success_clears_flag_until_next_change() {
        let (scheduler, transport, _temp_dir) = setup();
        scheduler.mark_changed();
        let before = now();

        assert!(scheduler.maybe_backup(false).await.performed);
        assert!(!scheduler.is_dirty());
        assert!(scheduler.last_snapshot().unwrap() >= before);

        // Immediately after: nothing to do
        let again = scheduler.maybe_backup(false).await;
        assert_eq!(again.reason, BackupReason::NotDirty);

        // A new change is still gated by the interval
        scheduler.mark_changed();
        let gated = scheduler.maybe_backup(false).await;
        assert_eq!(gated.reason, BackupReason::IntervalNotElapsed);
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sixty_minute_interval() {
        let (scheduler, _transport, _temp_dir) = setup();
        scheduler.mark_changed();

        scheduler.set_last_snapshot(now() - chrono::Duration::minutes(30));
        assert!(!scheduler.maybe_backup(false).await.performed);

        scheduler.set_last_snapshot(now() - chrono::Duration::minutes(61));
        assert!(scheduler.maybe_backup(false).await.performed);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_state() {
        let (scheduler, transport, _temp_dir) = setup();
        transport.fail.store(true, Ordering::SeqCst);
        let last = now() - chrono::Duration::minutes(61);
        scheduler.set_last_snapshot(last);
        scheduler.mark_changed();

        let result = scheduler.maybe_backup(false).await;

        assert!(!result.performed);
        assert_eq!(result.reason, BackupReason::Error);
        assert!(result.error.unwrap().contains("connection refused"));
        assert!(scheduler.is_dirty());
        assert_eq!(scheduler.last_snapshot(), Some(last));
        assert!(scheduler.status().last_error.is_some());
        assert!(!scheduler.status().in_progress);
    }

    #[tokio::test]
    async fn test_no_transport_configured() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(ItemStore::open(temp_dir.path().join("db.json")).unwrap());
        let scheduler = BackupScheduler::new(SchedulerConfig::default(), store, None);
        scheduler.mark_changed();

        let backup = scheduler.maybe_backup(true).await;
        assert_eq!(backup.reason, BackupReason::TransportUnavailable);
        assert!(scheduler.is_dirty());

        let restore = scheduler.restore_latest().await;
        assert_eq!(restore.reason, RestoreReason::TransportUnavailable);
        assert!(scheduler.backup_info().await.is_err());
    }

    #[tokio::test]
    async fn test_restore_without_snapshot() {
        let (scheduler, _transport, _temp_dir) = setup();
        let result = scheduler.restore_latest().await;
        assert!(!result.restored);
        assert_eq!(result.reason, RestoreReason::NoSnapshot);
    }

    #[tokio::test]
    async fn test_status_reports_next_eligible() {
        let (scheduler, _transport, _temp_dir) = setup();
        let last = now() - chrono::Duration::minutes(10);
        scheduler.set_last_snapshot(last);
        scheduler.mark_changed();

        let status = scheduler.status();
        assert!(status.dirty);
        assert_eq!(status.pending_changes, 1);
        assert_eq!(status.next_eligible, last + chrono::Duration::minutes(60));
        assert!(!status.backup_due);
        assert!(status.transport_available);
        assert_eq!(status.backup_interval_secs, 3600);
    }

    #[tokio::test]
    async fn test_shutdown_exports_dirty_store() {
        let (scheduler, transport, _temp_dir) = setup();
        let scheduler = Arc::new(scheduler);
        scheduler.start();
        scheduler.set_last_snapshot(now());
        scheduler
            .store
            .create(ItemCreate {
                name: "Unsaved".to_string(),
                description: None,
            })
            .unwrap();
        scheduler.mark_changed();

        let result = scheduler.shutdown().await.unwrap();

        assert!(result.performed);
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_dirty());
    }

    #[tokio::test]
    async fn test_shutdown_clean_store_skips_backup() {
        let (scheduler, transport, _temp_dir) = setup();
        assert!(scheduler.shutdown().await.is_none());
        assert_eq!(transport.exports.load(Ordering::SeqCst), 0);
    }

    async fn wait_until_clean(
        scheduler: &BackupScheduler,
        step: Duration,
        max_steps: usize,
    ) -> bool {
        for _ in 0..max_steps {
            if !scheduler.is_dirty() {
                return true;
            }
            tokio::time::sleep(step).await;
        }
        !scheduler.is_dirty()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_exports_on_check_interval() {
        let (scheduler, transport, _temp_dir) = setup();
        let scheduler = Arc::new(scheduler);
        scheduler.start();
        scheduler.mark_changed();

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(transport.exports.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_dirty());

        assert!(wait_until_clean(&scheduler, Duration::from_millis(500), 20).await);
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);

        assert!(scheduler.shutdown().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_check_wakes_timer() {
        let (scheduler, transport, _temp_dir) = setup();
        let scheduler = Arc::new(scheduler);
        scheduler.start();

        scheduler.mark_changed();
        scheduler.request_check();

        // Well before the first periodic tick
        assert!(wait_until_clean(&scheduler, Duration::from_millis(10), 100).await);
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);

        // A further change is gated by the interval, even when woken
        scheduler.mark_changed();
        scheduler.request_check();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.is_dirty());
        assert_eq!(transport.exports.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }
}
