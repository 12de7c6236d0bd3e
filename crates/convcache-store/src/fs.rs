//! Filesystem seam for the cache store
//!
//! The store only needs three primitives. Production code uses
//! [`TokioFs`]; tests substitute backends that fail on demand.

use std::io;
use std::path::Path;

/// Byte-level filesystem primitives used by [`crate::CacheStore`]
#[async_trait::async_trait]
pub trait CacheFs: Send + Sync + std::fmt::Debug {
    /// Read the whole file at `path`
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create `path` and all missing parents
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write `bytes` to `path`, replacing existing content
    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

/// [`CacheFs`] backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait::async_trait]
impl CacheFs for TokioFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokio_fs_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let fs = TokioFs;

        fs.create_dir_all(&nested).await.unwrap();
        fs.write(&nested.join("entry"), b"payload").await.unwrap();

        assert_eq!(fs.read(&nested.join("entry")).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn tokio_fs_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = TokioFs.read(&dir.path().join("nope")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
