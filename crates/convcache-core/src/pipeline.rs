//! Host pipeline boundary
//!
//! The host exposes one of two hook shapes depending on its version:
//!
//! ```text
//! 4.x   emit ───────────────────────────────▶ pass(compilation)
//! 5.x+  this_compilation ─▶ process_assets[ADDITIONAL] ─▶ pass(compilation)
//! ```
//!
//! The shape is probed once and a matching [`HookAdapter`] registers the
//! pass handler; nothing re-branches on the version afterwards.

use crate::asset::{Asset, AssetSink};
use crate::error::PipelineError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// A compilation as seen by the plugin
pub trait Compilation: AssetSink {
    /// Snapshot of the current assets
    fn assets(&self) -> Vec<(String, Asset)>;

    /// Append an error to this compilation's error list
    fn push_error(&self, error: PipelineError);
}

/// Async callback the host awaits before advancing
pub type PassHandler = Arc<dyn Fn(Arc<dyn Compilation>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Called when the host starts a compilation, to tap its sub-stages
pub type CompilationCallback = Arc<dyn Fn(&mut dyn CompilationHooks) + Send + Sync>;

/// Position of a process-assets tap within the host's stage ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessAssetsStage(pub i32);

impl ProcessAssetsStage {
    /// Stage for adding new assets derived from existing ones
    pub const ADDITIONAL: Self = Self(-2000);
}

/// Registration details for a process-assets tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessAssetsTap {
    /// Tap name
    pub name: String,
    /// Stage to run in
    pub stage: ProcessAssetsStage,
    /// The handler adds assets
    pub additional_assets: bool,
}

/// Compiler-level hooks
pub trait HostHooks {
    /// Tap the single emit stage
    fn tap_emit(&mut self, name: &str, handler: PassHandler);

    /// Tap compilation start
    fn tap_this_compilation(&mut self, name: &str, callback: CompilationCallback);
}

/// Hooks of one compilation
pub trait CompilationHooks {
    /// Tap the process-assets sub-stage
    fn tap_process_assets(&mut self, tap: ProcessAssetsTap, handler: PassHandler);
}

/// Host version, as announced by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVersion {
    raw: String,
    major: Option<u64>,
}

impl HostVersion {
    /// Parse a version string; unparsable versions have no major
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let major = raw
            .split_once('.')
            .and_then(|(major, _)| major.parse().ok());
        Self {
            raw: raw.to_string(),
            major,
        }
    }

    /// Major version
    #[inline]
    #[must_use]
    pub fn major(&self) -> Option<u64> {
        self.major
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Hook shape offered by a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookShape {
    /// Single emit-stage hook (4.x hosts)
    Emit,
    /// Compilation start followed by the process-assets sub-stage
    ProcessAssets,
}

impl HookShape {
    /// Pick the shape for `version`
    #[must_use]
    pub fn probe(version: &HostVersion) -> Self {
        if version.major() == Some(4) {
            Self::Emit
        } else {
            Self::ProcessAssets
        }
    }

    /// Adapter registering handlers in this shape
    #[must_use]
    pub fn adapter(self, name: &str) -> Box<dyn HookAdapter> {
        match self {
            Self::Emit => Box::new(EmitHookAdapter::new(name)),
            Self::ProcessAssets => Box::new(ProcessAssetsHookAdapter::new(name)),
        }
    }
}

/// Registers a pass handler with a host
pub trait HookAdapter: Send + Sync {
    /// Shape this adapter targets
    fn shape(&self) -> HookShape;

    /// Register `handler`
    fn register(&self, hooks: &mut dyn HostHooks, handler: PassHandler);
}

/// Adapter for hosts with a single emit hook
#[derive(Debug, Clone)]
pub struct EmitHookAdapter {
    name: String,
}

impl EmitHookAdapter {
    /// Create adapter tapping under `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HookAdapter for EmitHookAdapter {
    fn shape(&self) -> HookShape {
        HookShape::Emit
    }

    fn register(&self, hooks: &mut dyn HostHooks, handler: PassHandler) {
        hooks.tap_emit(&self.name, handler);
    }
}

/// Adapter for hosts with the two-phase process-assets hook
#[derive(Debug, Clone)]
pub struct ProcessAssetsHookAdapter {
    name: String,
}

impl ProcessAssetsHookAdapter {
    /// Create adapter tapping under `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HookAdapter for ProcessAssetsHookAdapter {
    fn shape(&self) -> HookShape {
        HookShape::ProcessAssets
    }

    fn register(&self, hooks: &mut dyn HostHooks, handler: PassHandler) {
        let name = self.name.clone();
        hooks.tap_this_compilation(
            &self.name,
            Arc::new(move |compilation_hooks: &mut dyn CompilationHooks| {
                compilation_hooks.tap_process_assets(
                    ProcessAssetsTap {
                        name: name.clone(),
                        stage: ProcessAssetsStage::ADDITIONAL,
                        additional_assets: true,
                    },
                    Arc::clone(&handler),
                );
            }),
        );
    }
}
