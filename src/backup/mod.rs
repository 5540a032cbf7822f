//! Snapshot backup and restore
//!
//! - [`transport`]: where snapshots are stored ([`SnapshotTransport`], [`FsBoard`])
//! - [`scheduler`]: when snapshots are taken ([`BackupScheduler`])

pub mod scheduler;
pub mod transport;

pub use scheduler::{
    BackupReason, BackupResult, BackupScheduler, BackupStatus, Operation, RestoreReason,
    RestoreResult, SchedulerConfig,
};
pub use transport::{
    FsBoard, RemoteHandle, RemoteSnapshot, SnapshotMeta, SnapshotTransport, TransportError,
    TransportResult,
};
