//! Cached asset conversion for build pipelines
//!
//! Applies caller-supplied transforms to the assets of a build, registers
//! the results as new assets and memoizes each conversion on disk by the
//! content hash of its input:
//! - [`ConfigSet`] validates and normalizes transform configs
//! - [`TransformOrchestrator`] runs one pass over an asset snapshot
//! - [`ConvertCachePlugin`] hooks a pass into a host pipeline
//!
//! # Example
//!
//! ```rust,ignore
//! use convcache_core::prelude::*;
//! use regex::Regex;
//!
//! let plugin = ConvertCachePlugin::new(
//!     TransformConfig::builder()
//!         .test(Regex::new(r"\.png$")?)
//!         .convert_fn(|bytes: Vec<u8>| async move { encode_webp(&bytes) })
//!         .filename(|name: &str| format!("{name}.webp")),
//! );
//!
//! plugin.apply(&mut host_hooks, "5.90.1");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod asset;
pub mod config;
pub mod delta;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod plugin;
pub mod transform;

pub use asset::{Asset, AssetSink};
pub use config::{
    CacheEnv, ConfigDefaults, ConfigRejection, ConfigSet, RawConfigs, RawTransformConfig,
    RequiredOption, TransformConfig, TransformOptions, CACHE_DIR_VAR, NAMESPACE,
};
pub use delta::{delta_kb, format_size, CacheWarning, DeltaRecord, NameCollision, PassReport};
pub use error::{ConvertError, ConvertResult, PipelineError};
pub use logging::init_tracing;
pub use orchestrator::{OrchestratorOptions, TransformOrchestrator};
pub use pipeline::{
    Compilation, CompilationCallback, CompilationHooks, EmitHookAdapter, HookAdapter, HookShape,
    HostHooks, HostVersion, PassHandler, ProcessAssetsHookAdapter, ProcessAssetsStage,
    ProcessAssetsTap,
};
pub use plugin::ConvertCachePlugin;
pub use transform::{AssetTest, FnTest, FnTransform, NameFn, Transform, TransformError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing transforms and hosting the plugin
    pub use crate::{
        Asset, AssetSink, Compilation, ConfigDefaults, ConvertCachePlugin, ConvertError,
        HostHooks, PassReport, RawTransformConfig, Transform, TransformConfig, TransformError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
