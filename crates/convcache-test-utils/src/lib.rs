//! Testing utilities for the convcache workspace
//!
//! An in-memory host pipeline, a fault-injecting cache filesystem and a
//! handful of transform fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use convcache_core::{
    Asset, AssetSink, Compilation, CompilationCallback, CompilationHooks, ConfigDefaults,
    ConvertCachePlugin, HostHooks, PassHandler, PipelineError, ProcessAssetsTap, RawConfigs,
    RawTransformConfig, Transform, TransformConfig, TransformError,
};
use convcache_store::{CacheFs, CacheStore, TokioFs};
use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Compilation holding its assets in memory
#[derive(Debug, Default)]
pub struct MemoryCompilation {
    assets: DashMap<String, Asset>,
    errors: Mutex<Vec<PipelineError>>,
}

impl MemoryCompilation {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_asset(self, name: &str, body: impl Into<Asset>) -> Self {
        self.assets.insert(name.to_string(), body.into());
        self
    }

    pub fn asset(&self, name: &str) -> Option<Asset> {
        self.assets.get(name).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.assets.contains_key(name)
    }

    /// Asset names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.assets.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn errors(&self) -> Vec<PipelineError> {
        self.errors.lock().clone()
    }
}

impl AssetSink for MemoryCompilation {
    fn emit_asset(&self, name: String, asset: Asset) -> Option<Asset> {
        self.assets.insert(name, asset)
    }
}

impl Compilation for MemoryCompilation {
    fn assets(&self) -> Vec<(String, Asset)> {
        self.assets
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn push_error(&self, error: PipelineError) {
        self.errors.lock().push(error);
    }
}

/// Host hooks that record taps and can replay a compilation
#[derive(Default)]
pub struct RecordingHooks {
    emit: Vec<(String, PassHandler)>,
    this_compilation: Vec<(String, CompilationCallback)>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_taps(&self) -> Vec<&str> {
        self.emit.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn compilation_taps(&self) -> Vec<&str> {
        self.this_compilation
            .iter()
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Drive one compilation through every recorded tap
    ///
    /// Returns the process-assets taps registered while it started.
    pub async fn run_compilation(
        &self,
        compilation: Arc<dyn Compilation>,
    ) -> Vec<ProcessAssetsTap> {
        let mut stages = ProcessAssetsHooks::default();
        for (_, callback) in &self.this_compilation {
            callback(&mut stages);
        }
        stages.taps.sort_by_key(|(tap, _)| tap.stage);

        for (tap, handler) in &stages.taps {
            if tap.additional_assets {
                handler(Arc::clone(&compilation)).await;
            }
        }
        for (_, handler) in &self.emit {
            handler(Arc::clone(&compilation)).await;
        }

        stages.taps.into_iter().map(|(tap, _)| tap).collect()
    }
}

impl HostHooks for RecordingHooks {
    fn tap_emit(&mut self, name: &str, handler: PassHandler) {
        self.emit.push((name.to_string(), handler));
    }

    fn tap_this_compilation(&mut self, name: &str, callback: CompilationCallback) {
        self.this_compilation.push((name.to_string(), callback));
    }
}

#[derive(Default)]
struct ProcessAssetsHooks {
    taps: Vec<(ProcessAssetsTap, PassHandler)>,
}

impl CompilationHooks for ProcessAssetsHooks {
    fn tap_process_assets(&mut self, tap: ProcessAssetsTap, handler: PassHandler) {
        self.taps.push((tap, handler));
    }
}

// ---------------------------------------------------------------------------
// Cache filesystem faults
// ---------------------------------------------------------------------------

/// [`CacheFs`] over `tokio::fs` with injectable failures
#[derive(Debug, Clone, Default)]
pub struct FaultyFs {
    read_fault: Option<fn() -> io::Error>,
    mkdir_fault: Option<fn() -> io::Error>,
    write_fault: Option<fn() -> io::Error>,
}

impl FaultyFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads fail with `EACCES`
    #[must_use]
    pub fn deny_reads(mut self) -> Self {
        self.read_fault = Some(permission_denied);
        self
    }

    /// Directory creation and writes fail with `EACCES`
    #[must_use]
    pub fn deny_writes(mut self) -> Self {
        self.mkdir_fault = Some(permission_denied);
        self.write_fault = Some(permission_denied);
        self
    }

    /// Directories are created, but entry writes fail with `EACCES`
    #[must_use]
    pub fn deny_entry_writes(mut self) -> Self {
        self.write_fault = Some(permission_denied);
        self
    }

    /// Directory creation and writes fail with `EROFS`
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.mkdir_fault = Some(read_only_filesystem);
        self.write_fault = Some(read_only_filesystem);
        self
    }

    /// Directory creation and writes fail with an unrecognised error
    #[must_use]
    pub fn broken_writes(mut self) -> Self {
        self.mkdir_fault = Some(disk_on_fire);
        self.write_fault = Some(disk_on_fire);
        self
    }

    pub fn into_store(self) -> CacheStore {
        CacheStore::with_fs(Arc::new(self))
    }
}

fn permission_denied() -> io::Error {
    io::Error::from(io::ErrorKind::PermissionDenied)
}

fn read_only_filesystem() -> io::Error {
    io::Error::from_raw_os_error(30)
}

fn disk_on_fire() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "disk on fire")
}

#[async_trait]
impl CacheFs for FaultyFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.read_fault {
            Some(fault) => Err(fault()),
            None => TokioFs.read(path).await,
        }
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        match self.mkdir_fault {
            Some(fault) => Err(fault()),
            None => TokioFs.create_dir_all(path).await,
        }
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        match self.write_fault {
            Some(fault) => Err(fault()),
            None => TokioFs.write(path, bytes).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// Transform applying a pure function and counting invocations
#[derive(Clone)]
pub struct CountingTransform {
    map: fn(&[u8]) -> Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl CountingTransform {
    pub fn new(map: fn(&[u8]) -> Vec<u8>) -> Self {
        Self {
            map,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transform for CountingTransform {
    async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((self.map)(input))
    }
}

/// Transform that always fails
#[derive(Debug, Clone)]
pub struct FailingTransform(pub &'static str);

#[async_trait]
impl Transform for FailingTransform {
    async fn convert(&self, _input: &[u8]) -> Result<Vec<u8>, TransformError> {
        Err(TransformError::msg(self.0))
    }
}

/// Keep the first quarter of the input
pub fn quarter(input: &[u8]) -> Vec<u8> {
    input[..input.len() / 4].to_vec()
}

pub fn uppercase(input: &[u8]) -> Vec<u8> {
    input.to_ascii_uppercase()
}

/// Config matching names ending in `.<ext>`, writing `<candidate>.<suffix>`
pub fn config_for(
    ext: &str,
    transform: impl Transform + 'static,
    suffix: &str,
) -> RawTransformConfig {
    let suffix = suffix.to_string();
    let pattern = format!(r"\.{}$", regex::escape(ext));
    TransformConfig::builder()
        .test(Regex::new(&pattern).expect("escaped extension is a valid regex"))
        .convert(transform)
        .filename(move |name: &str| format!("{name}.{suffix}"))
        .verbose(false)
}

/// Plugin with all defaults pointing at `cache_dir`
pub fn plugin_in(cache_dir: &Path, raw: impl Into<RawConfigs>) -> ConvertCachePlugin {
    ConvertCachePlugin::with_defaults(raw, &ConfigDefaults::with_cache_dir(cache_dir))
}

/// Bytes of `len` repetitions of a short pattern
pub fn payload(len: usize) -> Vec<u8> {
    b"convcache".iter().copied().cycle().take(len).collect()
}
