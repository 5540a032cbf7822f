//! Atomic file operations
//!
//! Every file that may be read while it is being replaced (the item store,
//! snapshot payloads, snapshot metadata) goes through here:
//!
//! 1. Write to a sibling `.tmp` file
//! 2. `sync_all()` to flush to disk
//! 3. Rename over the final path
//!
//! A reader therefore sees either the old file or the new one, never a
//! partial write.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for atomic operations
pub type AtomicResult<T> = Result<T, AtomicError>;

/// Errors that can occur during atomic operations
#[derive(Debug, Error)]
pub enum AtomicError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Source file does not exist: {0}")]
    MissingSource(PathBuf),
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically write content to a file
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> AtomicResult<()> {
    atomic_write_with(path, |file| file.write_all(content))
}

/// Atomically write content using a writer function
///
/// The closure receives the temp file; the rename only happens if it
/// returns `Ok`. On error the temp file is removed.
fn atomic_write_with<P, F>(path: P, write_fn: F) -> AtomicResult<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let result = (|| -> io::Result<()> {
        let mut file = File::create(&temp_path)?;
        write_fn(&mut file)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}

/// Atomically copy `from` over `to`
///
/// Returns the number of bytes copied.
pub fn atomic_copy<P1, P2>(from: P1, to: P2) -> AtomicResult<u64>
where
    P1: AsRef<Path>,
    P2: AsRef<Path>,
{
    let from = from.as_ref();
    if !from.exists() {
        return Err(AtomicError::MissingSource(from.to_path_buf()));
    }

    let mut source = File::open(from)?;
    let mut copied = 0;
    atomic_write_with(to, |file| {
        copied = io::copy(&mut source, file)?;
        Ok(())
    })?;

    Ok(copied)
}

/// Clean up any leftover temp files from interrupted operations
///
/// Call this on startup for the data directory.
pub fn cleanup_temp_files<P: AsRef<Path>>(dir: P) -> AtomicResult<usize> {
    let dir = dir.as_ref();
    let mut cleaned = 0;

    if !dir.exists() {
        return Ok(0);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().map(|e| e == "tmp").unwrap_or(false) {
            fs::remove_file(&path)?;
            cleaned += 1;
        }
    }

    Ok(cleaned)
}
