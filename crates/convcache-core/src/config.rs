//! Transform configuration
//!
//! Callers hand in [`RawTransformConfig`]s, which may be incomplete.
//! [`ConfigSet::normalize`] validates them, drops (with a warning) the ones
//! missing a required option and merges the rest over [`ConfigDefaults`].
//! The resulting [`TransformConfig`]s are immutable.

use crate::transform::{AssetTest, FnTest, FnTransform, NameFn, Transform, TransformError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name used in log lines, cache directory names and pipeline hook taps
pub const NAMESPACE: &str = "convert-cache-asset";

/// Environment variable that overrides the default cache location
pub const CACHE_DIR_VAR: &str = "CACHE_DIR";

/// Options every config must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredOption {
    /// Asset predicate
    Test,
    /// Buffer transform
    Convert,
    /// Output naming function
    Filename,
}

impl RequiredOption {
    /// All required options, in reporting order
    pub const ALL: [Self; 3] = [Self::Test, Self::Convert, Self::Filename];

    /// Option name as callers spell it
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Convert => "convert",
            Self::Filename => "filename",
        }
    }
}

impl fmt::Display for RequiredOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional, plain-data part of a config
///
/// Unset fields fall back to [`ConfigDefaults`]. Deserializes from the
/// camelCase keys build configs usually carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformOptions {
    /// Strip the final extension before calling `filename`
    pub override_extension: Option<bool>,
    /// Log one line per converted asset
    pub verbose: Option<bool>,
    /// Read and write the on-disk cache
    pub cache: Option<bool>,
    /// Directory holding cache entries
    pub cache_dir: Option<PathBuf>,
}

/// Caller-supplied config before validation
#[derive(Clone, Default)]
pub struct RawTransformConfig {
    /// Asset predicate
    pub test: Option<Arc<dyn AssetTest>>,
    /// Buffer transform
    pub convert: Option<Arc<dyn Transform>>,
    /// Output naming function
    pub filename: Option<NameFn>,
    /// Plain-data options
    pub options: TransformOptions,
}

impl RawTransformConfig {
    /// Empty config; every required option still has to be set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the asset predicate
    #[must_use]
    pub fn test(mut self, test: impl AssetTest + 'static) -> Self {
        self.test = Some(Arc::new(test));
        self
    }

    /// Set the asset predicate from a closure
    #[must_use]
    pub fn test_fn<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.test(FnTest(f))
    }

    /// Set the buffer transform
    #[must_use]
    pub fn convert(mut self, convert: impl Transform + 'static) -> Self {
        self.convert = Some(Arc::new(convert));
        self
    }

    /// Set the buffer transform from an async closure
    #[must_use]
    pub fn convert_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, TransformError>> + Send + 'static,
    {
        self.convert(FnTransform(f))
    }

    /// Set the output naming function
    #[must_use]
    pub fn filename<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.filename = Some(Arc::new(f));
        self
    }

    /// Replace all plain-data options at once
    #[must_use]
    pub fn options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// With extension stripping
    #[must_use]
    pub fn override_extension(mut self, enabled: bool) -> Self {
        self.options.override_extension = Some(enabled);
        self
    }

    /// With per-asset logging
    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.options.verbose = Some(enabled);
        self
    }

    /// With on-disk caching
    #[must_use]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.options.cache = Some(enabled);
        self
    }

    /// With a specific cache directory
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.cache_dir = Some(dir.into());
        self
    }

    /// Required options that are not set
    #[must_use]
    pub fn missing(&self) -> Vec<RequiredOption> {
        RequiredOption::ALL
            .into_iter()
            .filter(|option| match option {
                RequiredOption::Test => self.test.is_none(),
                RequiredOption::Convert => self.convert.is_none(),
                RequiredOption::Filename => self.filename.is_none(),
            })
            .collect()
    }
}

impl fmt::Debug for RawTransformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTransformConfig")
            .field("test", &self.test.is_some())
            .field("convert", &self.convert.is_some())
            .field("filename", &self.filename.is_some())
            .field("options", &self.options)
            .finish()
    }
}

/// Inputs to default cache directory resolution
///
/// Captured once so that resolution itself stays a pure function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEnv {
    /// Value of `CACHE_DIR`, if set
    pub cache_dir_var: Option<String>,
    /// Platform cache directory
    pub os_cache_dir: Option<PathBuf>,
    /// Home directory
    pub home_dir: Option<PathBuf>,
    /// Temporary directory
    pub temp_dir: PathBuf,
}

impl CacheEnv {
    /// Snapshot the current process environment
    #[must_use]
    pub fn from_system() -> Self {
        Self {
            cache_dir_var: std::env::var(CACHE_DIR_VAR).ok(),
            os_cache_dir: dirs::cache_dir(),
            home_dir: dirs::home_dir(),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Default cache directory
    ///
    /// `CACHE_DIR/<namespace>`, then `<os cache dir>/<namespace>`, then the
    /// home directory, then the temp directory. `CACHE_DIR` is ignored when
    /// empty or set to a boolean-looking value.
    #[must_use]
    pub fn resolve_cache_dir(&self) -> PathBuf {
        if let Some(var) = self
            .cache_dir_var
            .as_deref()
            .filter(|v| !v.is_empty() && !matches!(*v, "true" | "false" | "1" | "0"))
        {
            return Path::new(var).join(NAMESPACE);
        }
        if let Some(dir) = &self.os_cache_dir {
            return dir.join(NAMESPACE);
        }
        self.home_dir
            .clone()
            .unwrap_or_else(|| self.temp_dir.clone())
    }
}

/// Values applied to options a config leaves unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDefaults {
    /// Default for `override_extension`
    pub override_extension: bool,
    /// Default for `verbose`
    pub verbose: bool,
    /// Default for `cache`
    pub cache: bool,
    /// Default for `cache_dir`
    pub cache_dir: PathBuf,
}

impl ConfigDefaults {
    /// Defaults with the cache directory resolved from `env`
    #[must_use]
    pub fn resolve(env: &CacheEnv) -> Self {
        Self::with_cache_dir(env.resolve_cache_dir())
    }

    /// Defaults with an explicit cache directory
    #[must_use]
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            override_extension: true,
            verbose: true,
            cache: true,
            cache_dir: cache_dir.into(),
        }
    }
}

/// Validated, immutable transform config
#[derive(Clone)]
pub struct TransformConfig {
    test: Arc<dyn AssetTest>,
    convert: Arc<dyn Transform>,
    filename: NameFn,
    override_extension: bool,
    verbose: bool,
    cache: bool,
    cache_dir: PathBuf,
}

impl TransformConfig {
    /// Start building a raw config
    #[inline]
    #[must_use]
    pub fn builder() -> RawTransformConfig {
        RawTransformConfig::new()
    }

    /// Validate `raw` and merge it over `defaults`
    ///
    /// # Errors
    /// Returns the missing required options.
    pub fn from_raw(
        raw: RawTransformConfig,
        defaults: &ConfigDefaults,
    ) -> Result<Self, Vec<RequiredOption>> {
        let missing = raw.missing();
        let (Some(test), Some(convert), Some(filename)) = (raw.test, raw.convert, raw.filename)
        else {
            return Err(missing);
        };
        let options = raw.options;

        Ok(Self {
            test,
            convert,
            filename,
            override_extension: options
                .override_extension
                .unwrap_or(defaults.override_extension),
            verbose: options.verbose.unwrap_or(defaults.verbose),
            cache: options.cache.unwrap_or(defaults.cache),
            cache_dir: options
                .cache_dir
                .unwrap_or_else(|| defaults.cache_dir.clone()),
        })
    }

    /// Whether this config applies to the asset called `name`
    #[inline]
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.test.matches(name)
    }

    /// Run the transform
    ///
    /// # Errors
    /// Whatever the transform returns.
    pub async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        self.convert.convert(input).await
    }

    /// Name of the asset produced from `name`
    ///
    /// With `override_extension` the last `.`-separated segment is dropped
    /// first (a name without a dot becomes empty). The `filename` result is
    /// used verbatim.
    #[must_use]
    pub fn output_name(&self, name: &str) -> String {
        let candidate = if self.override_extension {
            strip_extension(name)
        } else {
            name
        };
        (self.filename)(candidate)
    }

    /// Strip the final extension before naming
    #[inline]
    #[must_use]
    pub fn override_extension(&self) -> bool {
        self.override_extension
    }

    /// Log per-asset lines
    #[inline]
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Use the on-disk cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> bool {
        self.cache
    }

    /// Cache directory
    #[inline]
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl fmt::Debug for TransformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformConfig")
            .field("override_extension", &self.override_extension)
            .field("verbose", &self.verbose)
            .field("cache", &self.cache)
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

fn strip_extension(name: &str) -> &str {
    name.rfind('.').map_or("", |idx| &name[..idx])
}

/// One config or an ordered list of them
#[derive(Debug, Clone)]
pub enum RawConfigs {
    /// A single config
    One(RawTransformConfig),
    /// Several configs, applied in order
    Many(Vec<RawTransformConfig>),
}

impl RawConfigs {
    fn into_vec(self) -> Vec<RawTransformConfig> {
        match self {
            Self::One(raw) => vec![raw],
            Self::Many(raws) => raws,
        }
    }
}

impl From<RawTransformConfig> for RawConfigs {
    fn from(raw: RawTransformConfig) -> Self {
        Self::One(raw)
    }
}

impl From<Vec<RawTransformConfig>> for RawConfigs {
    fn from(raws: Vec<RawTransformConfig>) -> Self {
        Self::Many(raws)
    }
}

/// A config that was dropped during normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRejection {
    /// Position in the caller's list
    pub index: usize,
    /// Required options that were missing
    pub missing: Vec<RequiredOption>,
}

/// Normalized, ordered list of enabled configs
#[derive(Debug, Clone, Default)]
pub struct ConfigSet {
    configs: Vec<Arc<TransformConfig>>,
    rejections: Vec<ConfigRejection>,
}

impl ConfigSet {
    /// Validate and merge raw configs
    ///
    /// Invalid entries are logged and skipped; they never prevent the
    /// others from running.
    pub fn normalize(raw: impl Into<RawConfigs>, defaults: &ConfigDefaults) -> Self {
        let mut configs = Vec::new();
        let mut rejections = Vec::new();

        for (index, raw) in raw.into().into_vec().into_iter().enumerate() {
            match TransformConfig::from_raw(raw, defaults) {
                Ok(config) => configs.push(Arc::new(config)),
                Err(missing) => {
                    tracing::warn!(
                        index,
                        missing = %join_options(&missing),
                        "{NAMESPACE} config(s) must contain the required options: {}",
                        join_options(&RequiredOption::ALL)
                    );
                    rejections.push(ConfigRejection { index, missing });
                }
            }
        }

        Self {
            configs,
            rejections,
        }
    }

    /// Enabled configs in caller order
    #[inline]
    #[must_use]
    pub fn configs(&self) -> &[Arc<TransformConfig>] {
        &self.configs
    }

    /// Configs that were dropped
    #[inline]
    #[must_use]
    pub fn rejections(&self) -> &[ConfigRejection] {
        &self.rejections
    }

    /// Number of enabled configs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// No enabled configs
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

fn join_options(options: &[RequiredOption]) -> String {
    options
        .iter()
        .map(|o| o.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use regex::Regex;

    fn identity() -> RawTransformConfig {
        TransformConfig::builder()
            .test(Regex::new(r"\.css$").unwrap())
            .convert_fn(|bytes: Vec<u8>| async move { Ok::<_, TransformError>(bytes) })
            .filename(|name: &str| format!("{name}.min"))
    }

    fn defaults() -> ConfigDefaults {
        ConfigDefaults::with_cache_dir("/var/cache/convcache")
    }

    fn build(raw: RawTransformConfig) -> TransformConfig {
        TransformConfig::from_raw(raw, &defaults()).unwrap()
    }

    #[test]
    fn defaults_fill_unset_options() {
        let config = build(identity());
        assert!(config.override_extension());
        assert!(config.verbose());
        assert!(config.cache());
        assert_eq!(config.cache_dir(), Path::new("/var/cache/convcache"));
    }

    #[test]
    fn caller_options_take_precedence() {
        let config = build(
            identity()
                .override_extension(false)
                .verbose(false)
                .cache(false)
                .cache_dir("/tmp/mine"),
        );
        assert!(!config.override_extension());
        assert!(!config.verbose());
        assert!(!config.cache());
        assert_eq!(config.cache_dir(), Path::new("/tmp/mine"));
    }

    #[test]
    fn output_name_strips_extension() {
        let config = build(identity());
        assert_eq!(config.output_name("a.b.css"), "a.b.min");
    }

    #[test]
    fn output_name_keeps_extension_without_override() {
        let config = build(identity().override_extension(false));
        assert_eq!(config.output_name("a.b.css"), "a.b.css.min");
    }

    #[test]
    fn output_name_without_dot_strips_everything() {
        let config = build(identity());
        assert_eq!(config.output_name("LICENSE"), ".min");
    }

    #[test]
    fn filename_result_is_used_verbatim() {
        let config = build(identity().filename(|_name: &str| "fixed.bin".to_string()));
        assert_eq!(config.output_name("anything.css"), "fixed.bin");
    }

    #[test]
    fn missing_options_are_reported_in_order() {
        let raw = TransformConfig::builder().filename(|n: &str| n.to_string());
        assert_eq!(
            raw.missing(),
            vec![RequiredOption::Test, RequiredOption::Convert]
        );
    }

    #[test]
    fn normalize_drops_incomplete_configs() {
        let incomplete = TransformConfig::builder()
            .test(Regex::new("x").unwrap())
            .convert_fn(|bytes: Vec<u8>| async move { Ok::<_, TransformError>(bytes) });
        let set = ConfigSet::normalize(vec![identity(), incomplete, identity()], &defaults());

        assert_eq!(set.len(), 2);
        assert_eq!(
            set.rejections(),
            &[ConfigRejection {
                index: 1,
                missing: vec![RequiredOption::Filename],
            }]
        );
    }

    #[test]
    fn normalize_accepts_single_config() {
        let set = ConfigSet::normalize(identity(), &defaults());
        assert_eq!(set.len(), 1);
        assert!(set.rejections().is_empty());
    }

    #[test]
    fn normalize_of_only_invalid_is_empty() {
        let set = ConfigSet::normalize(RawTransformConfig::new(), &defaults());
        assert!(set.is_empty());
        assert_eq!(set.rejections()[0].missing, RequiredOption::ALL.to_vec());
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let options: TransformOptions = serde_json::from_str(
            r#"{"overrideExtension": false, "cacheDir": "/tmp/c"}"#,
        )
        .unwrap();
        assert_eq!(options.override_extension, Some(false));
        assert_eq!(options.cache_dir, Some(PathBuf::from("/tmp/c")));
        assert_eq!(options.verbose, None);
        assert_eq!(options.cache, None);
    }

    #[test]
    fn cache_dir_var_wins() {
        let env = CacheEnv {
            cache_dir_var: Some("/ci/cache".to_string()),
            os_cache_dir: Some(PathBuf::from("/home/u/.cache")),
            home_dir: Some(PathBuf::from("/home/u")),
            temp_dir: PathBuf::from("/tmp"),
        };
        assert_eq!(
            env.resolve_cache_dir(),
            Path::new("/ci/cache").join(NAMESPACE)
        );
    }

    #[test]
    fn boolean_cache_dir_var_is_ignored() {
        for value in ["true", "false", "1", "0", ""] {
            let env = CacheEnv {
                cache_dir_var: Some(value.to_string()),
                os_cache_dir: Some(PathBuf::from("/home/u/.cache")),
                home_dir: None,
                temp_dir: PathBuf::from("/tmp"),
            };
            assert_eq!(
                env.resolve_cache_dir(),
                Path::new("/home/u/.cache").join(NAMESPACE)
            );
        }
    }

    #[test]
    fn falls_back_to_home_then_temp() {
        let mut env = CacheEnv {
            cache_dir_var: None,
            os_cache_dir: None,
            home_dir: Some(PathBuf::from("/home/u")),
            temp_dir: PathBuf::from("/tmp"),
        };
        assert_eq!(env.resolve_cache_dir(), Path::new("/home/u"));

        env.home_dir = None;
        assert_eq!(env.resolve_cache_dir(), Path::new("/tmp"));
    }

    #[test]
    fn resolved_defaults_enable_everything() {
        let env = CacheEnv {
            temp_dir: PathBuf::from("/tmp"),
            ..CacheEnv::default()
        };
        let defaults = ConfigDefaults::resolve(&env);
        assert_eq!(defaults, ConfigDefaults::with_cache_dir("/tmp"));
    }

    proptest! {
        #[test]
        fn strip_extension_drops_last_dot_segment(name in "[a-z./]{0,24}") {
            let segments: Vec<&str> = name.split('.').collect();
            let expected = segments[..segments.len() - 1].join(".");
            prop_assert_eq!(strip_extension(&name), expected.as_str());
        }
    }
}
