//! Caller-supplied behaviour: asset predicates, buffer transforms and
//! output naming.
//!
//! Transforms are async and may suspend on external work (an encoder
//! process, a thread pool). Closures are adapted with [`FnTest`] and
//! [`FnTransform`].

use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Boxed error returned by a failing transform
#[derive(Debug)]
pub struct TransformError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl TransformError {
    /// Error carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }

    /// Wrap any error
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(source))
    }

    /// Unwrap the boxed source
    #[must_use]
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.0
    }
}

impl From<std::io::Error> for TransformError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

/// Decides which assets a config applies to
pub trait AssetTest: Send + Sync {
    /// Whether the asset called `name` should be converted
    fn matches(&self, name: &str) -> bool;
}

impl AssetTest for Regex {
    fn matches(&self, name: &str) -> bool {
        self.is_match(name)
    }
}

/// [`AssetTest`] wrapping a closure
pub struct FnTest<F>(pub F);

impl<F> AssetTest for FnTest<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, name: &str) -> bool {
        (self.0)(name)
    }
}

impl<F> fmt::Debug for FnTest<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnTest(..)")
    }
}

/// Buffer-to-buffer conversion
///
/// Implementations are not expected to be deterministic, but the cache
/// assumes they are: a cached result is reused for identical input.
#[async_trait::async_trait]
pub trait Transform: Send + Sync {
    /// Convert `input` into the new asset's bytes
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// [`Transform`] wrapping an async closure that takes ownership of a copy
/// of the input
pub struct FnTransform<F>(pub F);

#[async_trait::async_trait]
impl<F, Fut> Transform for FnTransform<F>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>, TransformError>> + Send,
{
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        (self.0)(input.to_vec()).await
    }
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnTransform(..)")
    }
}

/// Computes the output asset name from the (possibly extension-stripped)
/// input name
pub type NameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
