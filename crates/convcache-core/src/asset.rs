//! Assets and the collection they are registered into

use std::fmt;
use std::sync::Arc;

/// Immutable asset contents
///
/// Cloning shares the underlying buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Asset {
    bytes: Arc<[u8]>,
}

impl Asset {
    /// Create asset from bytes
    #[inline]
    #[must_use]
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Current bytes
    #[inline]
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte length
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl From<Vec<u8>> for Asset {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Asset {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Asset {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset").field("size", &self.size()).finish()
    }
}

/// Live asset collection new assets are written back into
///
/// Implementations must tolerate concurrent registrations.
pub trait AssetSink: Send + Sync {
    /// Register `asset` under `name`, returning the asset it replaced
    fn emit_asset(&self, name: String, asset: Asset) -> Option<Asset>;
}
