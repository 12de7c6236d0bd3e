//! Error types for the cache store
//!
//! Only failures the store cannot classify as recoverable surface here.
//! Missing paths, permission problems and read-only filesystems are
//! reported as [`crate::WriteOutcome::Skipped`] instead.

use std::path::PathBuf;

/// Errors during cache store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Unexpected I/O failure while persisting an entry
    #[error("cache io error at {}: {source}", path.display())]
    Io {
        /// Path that was being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path the failing operation targeted
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } => path,
        }
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
