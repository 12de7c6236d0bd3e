//! Plugin entry point
//!
//! Ties a normalized [`ConfigSet`] and an orchestrator to a host pipeline.

use crate::config::{CacheEnv, ConfigDefaults, ConfigSet, RawConfigs, NAMESPACE};
use crate::delta::PassReport;
use crate::error::PipelineError;
use crate::orchestrator::{OrchestratorOptions, TransformOrchestrator};
use crate::pipeline::{Compilation, HookShape, HostHooks, HostVersion, PassHandler};
use convcache_store::CacheStore;
use futures::FutureExt;
use std::sync::Arc;

/// Asset conversion plugin
#[derive(Debug, Clone)]
pub struct ConvertCachePlugin {
    orchestrator: Arc<TransformOrchestrator>,
}

impl ConvertCachePlugin {
    /// Create plugin, resolving defaults from the process environment
    #[must_use]
    pub fn new(raw: impl Into<RawConfigs>) -> Self {
        Self::with_defaults(raw, &ConfigDefaults::resolve(&CacheEnv::from_system()))
    }

    /// Create plugin with explicit defaults
    #[must_use]
    pub fn with_defaults(raw: impl Into<RawConfigs>, defaults: &ConfigDefaults) -> Self {
        let configs = Arc::new(ConfigSet::normalize(raw, defaults));
        Self::with_orchestrator(TransformOrchestrator::new(configs))
    }

    /// Create plugin around a prepared orchestrator
    #[must_use]
    pub fn with_orchestrator(orchestrator: TransformOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// With a specific cache store
    #[must_use]
    pub fn with_store(self, store: CacheStore) -> Self {
        let configs = Arc::new(self.configs().clone());
        let options = self.orchestrator.options();
        let orchestrator = TransformOrchestrator::with_store(configs, store).with_options(options);
        Self::with_orchestrator(orchestrator)
    }

    /// With orchestrator tuning
    #[must_use]
    pub fn with_options(self, options: OrchestratorOptions) -> Self {
        let orchestrator = (*self.orchestrator).clone().with_options(options);
        Self::with_orchestrator(orchestrator)
    }

    /// Enabled configs
    #[inline]
    #[must_use]
    pub fn configs(&self) -> &ConfigSet {
        self.orchestrator.configs()
    }

    /// Register with a host announcing `host_version`
    pub fn apply(&self, hooks: &mut dyn HostHooks, host_version: &str) -> HookShape {
        let version = HostVersion::parse(host_version);
        let shape = HookShape::probe(&version);
        tracing::debug!(%version, ?shape, "registering {NAMESPACE}");

        shape.adapter(NAMESPACE).register(hooks, self.pass_handler());
        shape
    }

    /// Run one pass over `compilation`
    ///
    /// A failing pass is reported through the compilation's error list and
    /// yields `None`.
    pub async fn run_pass(&self, compilation: &dyn Compilation) -> Option<PassReport> {
        let snapshot = compilation.assets();

        match self.orchestrator.process(compilation, &snapshot).await {
            Ok(report) => {
                tracing::info!(
                    converted = report.records.len(),
                    cache_hits = report.cache_hits(),
                    "{}",
                    report.summary()
                );
                Some(report)
            }
            Err(err) => {
                tracing::error!(error = %err, "{NAMESPACE} pass failed");
                compilation.push_error(PipelineError::from(&err));
                None
            }
        }
    }

    fn pass_handler(&self) -> PassHandler {
        let plugin = self.clone();
        Arc::new(move |compilation: Arc<dyn Compilation>| {
            let plugin = plugin.clone();
            async move {
                plugin.run_pass(compilation.as_ref()).await;
            }
            .boxed()
        })
    }
}
