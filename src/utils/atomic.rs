//! Atomic file replacement
//!
//! Content goes to a sibling `.tmp` file, is synced, then renamed over
//! the destination. Readers see either the old file or the new one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for atomic operations
pub type AtomicResult<T> = Result<T, AtomicError>;

/// Errors that can occur during atomic operations
#[derive(Debug, Error)]
pub enum AtomicError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AtomicError {
    fn io(path: &Path, source: io::Error) -> Self {
        AtomicError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Path of the temp file used while replacing `path`
pub fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

/// Atomically replace `path` with `content`, creating parent directories
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> AtomicResult<()> {
    let path = path.as_ref();
    let temp = temp_path(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AtomicError::io(parent, e))?;
    }

    let mut file = File::create(&temp).map_err(|e| AtomicError::io(&temp, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| AtomicError::io(&temp, e))?;
    file.sync_all().map_err(|e| AtomicError::io(&temp, e))?;

    fs::rename(&temp, path).map_err(|e| AtomicError::io(path, e))?;
    Ok(())
}

/// Remove a temp file left behind by an interrupted `atomic_write`.
/// Returns true if one was found.
pub fn remove_stale_temp<P: AsRef<Path>>(path: P) -> AtomicResult<bool> {
    let temp = temp_path(path.as_ref());
    match fs::remove_file(&temp) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AtomicError::io(&temp, e)),
    }
}
