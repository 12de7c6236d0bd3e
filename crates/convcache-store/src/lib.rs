//! Content-addressed cache store for converted assets
//!
//! Maps an input buffer to `<cache_dir>/<sha1 hex>` and persists the
//! converted bytes there. Every environmental failure is reported as a
//! typed outcome so that a broken cache directory can never fail a build.
//!
//! ```text
//! input bytes ──sha1──▶ <cache_dir>/<hex> ──read──▶ Hit | Miss | PermissionDenied
//!                                          ──write─▶ Stored | Skipped(reason) | Err
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod fs;
pub mod hash;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use fs::{CacheFs, TokioFs};
pub use hash::ContentHash;
pub use store::{CacheStore, ReadOutcome, SkipReason, WriteOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
