//! Utility functions and helpers
//!
//! Atomic file writes and timestamp helpers.

pub mod atomic;
pub mod time;

pub use atomic::{atomic_copy, atomic_write, cleanup_temp_files, AtomicError};
pub use time::{format_short, get_current_user, now};
