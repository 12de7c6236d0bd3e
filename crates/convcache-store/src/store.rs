//! Content-addressed on-disk store for transformed buffers
//!
//! Entries live at `<cache_dir>/<sha1 hex of the input>` and are never
//! expired. The store reports what happened through [`ReadOutcome`] and
//! [`WriteOutcome`]; deciding whether to log is left to the caller.

use crate::error::{StoreError, StoreResult};
use crate::fs::{CacheFs, TokioFs};
use crate::hash::ContentHash;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(unix)]
const EROFS: i32 = 30;

/// Result of looking up a cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Entry found
    Hit(Vec<u8>),
    /// No usable entry
    Miss,
    /// Entry could not be read because of permissions; treat as a miss
    PermissionDenied(PathBuf),
}

impl ReadOutcome {
    /// Cached bytes, if the lookup was a hit
    #[inline]
    #[must_use]
    pub fn into_hit(self) -> Option<Vec<u8>> {
        match self {
            Self::Hit(bytes) => Some(bytes),
            Self::Miss | Self::PermissionDenied(_) => None,
        }
    }
}

/// Why a write was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A path segment disappeared or could not be created
    MissingPath,
    /// Permission denied
    PermissionDenied,
    /// The cache directory is on a read-only filesystem
    ReadOnlyFilesystem,
}

impl SkipReason {
    /// Classify an I/O error, returning `None` when it is not recoverable
    #[must_use]
    pub fn classify(err: &io::Error) -> Option<Self> {
        match err.kind() {
            io::ErrorKind::NotFound => Some(Self::MissingPath),
            io::ErrorKind::PermissionDenied => Some(Self::PermissionDenied),
            _ if is_read_only(err) => Some(Self::ReadOnlyFilesystem),
            _ => None,
        }
    }

    /// Human-readable explanation used in warnings
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::MissingPath | Self::PermissionDenied => "due to a permission issue",
            Self::ReadOnlyFilesystem => "because it resides in a readonly filesystem",
        }
    }
}

#[cfg(unix)]
fn is_read_only(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EROFS)
}

#[cfg(not(unix))]
fn is_read_only(_err: &io::Error) -> bool {
    false
}

/// Result of persisting a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Entry written
    Stored,
    /// Entry not written; the computed bytes are still valid
    Skipped(SkipReason),
}

/// Content-addressed cache store
///
/// Holds no entries in memory; every lookup goes to the filesystem so the
/// cache survives process restarts and can be shared by several configs.
#[derive(Debug, Clone)]
pub struct CacheStore {
    fs: Arc<dyn CacheFs>,
}

impl CacheStore {
    /// Store backed by the real filesystem
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_fs(Arc::new(TokioFs))
    }

    /// Store backed by a custom filesystem
    #[inline]
    #[must_use]
    pub fn with_fs(fs: Arc<dyn CacheFs>) -> Self {
        Self { fs }
    }

    /// Cache path for `bytes` under `cache_dir`
    ///
    /// Depends only on the content, never on the asset name.
    #[inline]
    #[must_use]
    pub fn address_for(bytes: &[u8], cache_dir: &Path) -> PathBuf {
        cache_dir.join(ContentHash::compute(bytes).to_string())
    }

    /// Look up an entry
    ///
    /// Never fails: anything other than a permission problem is a miss.
    pub async fn get(&self, path: &Path) -> ReadOutcome {
        match self.fs.read(path).await {
            Ok(bytes) => ReadOutcome::Hit(bytes),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ReadOutcome::PermissionDenied(path.to_path_buf())
            }
            Err(_) => ReadOutcome::Miss,
        }
    }

    /// Persist an entry, creating the parent directory first
    ///
    /// # Errors
    /// Returns `StoreError::Io` for failures that [`SkipReason::classify`]
    /// does not recognise as recoverable.
    pub async fn put(&self, path: &Path, bytes: &[u8]) -> StoreResult<WriteOutcome> {
        if let Some(parent) = path.parent() {
            if let Err(e) = self.fs.create_dir_all(parent).await {
                return skip_or_fail(path, e);
            }
        }

        match self.fs.write(path, bytes).await {
            Ok(()) => Ok(WriteOutcome::Stored),
            Err(e) => skip_or_fail(path, e),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

fn skip_or_fail(path: &Path, err: io::Error) -> StoreResult<WriteOutcome> {
    match SkipReason::classify(&err) {
        Some(reason) => Ok(WriteOutcome::Skipped(reason)),
        None => Err(StoreError::io_error(path, err)),
    }
}
