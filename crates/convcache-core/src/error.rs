//! Error types for the conversion core
//!
//! Only semantic failures end up here. Environmental cache problems are
//! downgraded to [`crate::delta::CacheWarning`]s and never fail a pass.

use crate::config::NAMESPACE;
use crate::transform::TransformError;
use convcache_store::StoreError;

/// Main conversion error type
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// A transform rejected an asset; aborts the pass
    #[error("transform failed for {asset} -> {output}: {source}")]
    Transform {
        /// Input asset name
        asset: String,
        /// Output name the asset would have been registered under
        output: String,
        /// Error returned by the transform
        #[source]
        source: TransformError,
    },

    /// The cache store hit an unexpected I/O failure
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),

    /// Global tracing subscriber could not be installed
    #[error("tracing init failed: {0}")]
    TracingInit(String),
}

impl ConvertError {
    /// Create transform error for an asset
    pub fn transform(
        asset: impl Into<String>,
        output: impl Into<String>,
        source: TransformError,
    ) -> Self {
        Self::Transform {
            asset: asset.into(),
            output: output.into(),
            source,
        }
    }

    /// Whether a caller-supplied transform caused this error
    #[inline]
    #[must_use]
    pub fn is_transform_failure(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }
}

/// Result type alias for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Error entry appended to a compilation's error list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{plugin}: {message}")]
pub struct PipelineError {
    /// Plugin that reported the error
    pub plugin: String,
    /// Rendered error chain
    pub message: String,
}

impl From<&ConvertError> for PipelineError {
    fn from(err: &ConvertError) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            let cause_text = cause.to_string();
            if !message.contains(&cause_text) {
                message.push_str(": ");
                message.push_str(&cause_text);
            }
            source = cause.source();
        }
        Self {
            plugin: NAMESPACE.to_string(),
            message,
        }
    }
}
