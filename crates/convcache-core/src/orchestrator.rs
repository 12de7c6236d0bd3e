//! Transform orchestration
//!
//! Evaluates every (asset, config) pair of a snapshot concurrently:
//! predicate, output name, cache lookup, transform on miss, best-effort
//! cache write, registration, delta. Pairs run on the caller's task and
//! complete in no particular order.
//!
//! # Failure semantics
//!
//! - Cache read/write problems become [`CacheWarning`]s.
//! - A failing transform aborts the pass; in-flight pairs are dropped and
//!   no report is produced.
//! - An unexpected cache write failure aborts the pass as well.

use crate::asset::{Asset, AssetSink};
use crate::config::{ConfigSet, TransformConfig, NAMESPACE};
use crate::delta::{CacheWarning, DeltaRecord, NameCollision, PassReport};
use crate::error::{ConvertError, ConvertResult};
use convcache_store::{CacheStore, ReadOutcome, WriteOutcome};
use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Orchestrator tuning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Upper bound on pairs in flight; `None` dispatches all at once
    pub max_concurrency: Option<usize>,
}

impl OrchestratorOptions {
    /// Create default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a bound on concurrent pairs
    #[inline]
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }
}

enum PairOutcome {
    Unmatched,
    Converted {
        record: DeltaRecord,
        warnings: Vec<CacheWarning>,
        collision: Option<NameCollision>,
    },
}

/// Drives one conversion pass over an asset snapshot
#[derive(Debug, Clone)]
pub struct TransformOrchestrator {
    configs: Arc<ConfigSet>,
    store: CacheStore,
    options: OrchestratorOptions,
}

impl TransformOrchestrator {
    /// Create orchestrator using the real filesystem
    #[inline]
    #[must_use]
    pub fn new(configs: Arc<ConfigSet>) -> Self {
        Self::with_store(configs, CacheStore::new())
    }

    /// Create orchestrator with a specific cache store
    #[inline]
    #[must_use]
    pub fn with_store(configs: Arc<ConfigSet>, store: CacheStore) -> Self {
        Self {
            configs,
            store,
            options: OrchestratorOptions::default(),
        }
    }

    /// With tuning options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Configs this orchestrator applies
    #[inline]
    #[must_use]
    pub fn configs(&self) -> &ConfigSet {
        &self.configs
    }

    /// Current tuning options
    #[inline]
    #[must_use]
    pub fn options(&self) -> OrchestratorOptions {
        self.options
    }

    /// Process every (asset, config) pair of `snapshot`
    ///
    /// Converted assets are registered into `sink` as soon as each pair
    /// finishes.
    ///
    /// # Errors
    /// - `ConvertError::Transform` if any transform fails
    /// - `ConvertError::Store` on an unrecoverable cache write failure
    pub async fn process<S>(
        &self,
        sink: &S,
        snapshot: &[(String, Asset)],
    ) -> ConvertResult<PassReport>
    where
        S: AssetSink + ?Sized,
    {
        // Collected eagerly so the pass future stays `Send`.
        let mut pairs = Vec::with_capacity(snapshot.len() * self.configs.len());
        for (name, asset) in snapshot {
            for config in self.configs.configs() {
                pairs.push(self.process_pair(sink, name, asset, config));
            }
        }

        let outcomes: Vec<PairOutcome> = match self.options.max_concurrency {
            None => try_join_all(pairs).await?,
            Some(limit) => {
                stream::iter(pairs)
                    .buffer_unordered(limit)
                    .try_collect()
                    .await?
            }
        };

        let mut report = PassReport::default();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Unmatched => report.unmatched += 1,
                PairOutcome::Converted {
                    record,
                    warnings,
                    collision,
                } => {
                    report.records.push(record);
                    report.warnings.extend(warnings);
                    report.collisions.extend(collision);
                }
            }
        }

        tracing::debug!(
            converted = report.records.len(),
            unmatched = report.unmatched,
            cache_hits = report.cache_hits(),
            "conversion pass settled"
        );

        Ok(report)
    }

    async fn process_pair<S>(
        &self,
        sink: &S,
        name: &str,
        asset: &Asset,
        config: &TransformConfig,
    ) -> ConvertResult<PairOutcome>
    where
        S: AssetSink + ?Sized,
    {
        if !config.matches(name) {
            return Ok(PairOutcome::Unmatched);
        }

        let output = config.output_name(name);
        let input = asset.source();
        let mut warnings = Vec::new();

        let cache_path = config
            .cache()
            .then(|| CacheStore::address_for(input, config.cache_dir()));

        let cached = match &cache_path {
            Some(path) => match self.store.get(path).await {
                ReadOutcome::Hit(bytes) => Some(bytes),
                ReadOutcome::Miss => None,
                ReadOutcome::PermissionDenied(path) => {
                    tracing::warn!(
                        path = %path.display(),
                        "{NAMESPACE} could not read cache file: {} due to a permission issue.",
                        path.display()
                    );
                    warnings.push(CacheWarning::ReadPermissionDenied { path });
                    None
                }
            },
            None => None,
        };

        let cache_hit = cached.is_some();
        let converted = match cached {
            Some(bytes) => bytes,
            None => {
                let bytes = config
                    .convert(input)
                    .await
                    .map_err(|source| ConvertError::transform(name, &output, source))?;

                if let Some(path) = &cache_path {
                    match self.store.put(path, &bytes).await? {
                        WriteOutcome::Stored => {
                            tracing::trace!(path = %path.display(), "cache entry stored");
                        }
                        WriteOutcome::Skipped(reason) => {
                            tracing::warn!(
                                path = %path.display(),
                                ?reason,
                                "{NAMESPACE} could not write cache to file: {} {}.",
                                path.display(),
                                reason.describe()
                            );
                            warnings.push(CacheWarning::WriteSkipped {
                                path: path.clone(),
                                reason,
                            });
                        }
                    }
                }
                bytes
            }
        };

        let record = DeltaRecord {
            asset: name.to_string(),
            output: output.clone(),
            input_size: asset.size(),
            output_size: converted.len(),
            cache_hit,
        };

        let collision = sink
            .emit_asset(output.clone(), Asset::from(converted))
            .map(|_replaced| {
                tracing::warn!(
                    output = %output,
                    asset = %name,
                    "{NAMESPACE} output {output} replaced an existing asset"
                );
                NameCollision {
                    name: output,
                    asset: name.to_string(),
                }
            });

        if config.verbose() {
            tracing::info!("{}", record.log_line());
        }

        Ok(PairOutcome::Converted {
            record,
            warnings,
            collision,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigDefaults, RawTransformConfig, TransformConfig};
    use crate::transform::TransformError;
    use dashmap::DashMap;
    use regex::Regex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MapSink(DashMap<String, Asset>);

    impl AssetSink for MapSink {
        fn emit_asset(&self, name: String, asset: Asset) -> Option<Asset> {
            self.0.insert(name, asset)
        }
    }

    fn halve(calls: Arc<AtomicUsize>) -> RawTransformConfig {
        TransformConfig::builder()
            .test(Regex::new(r"\.txt$").unwrap())
            .convert_fn(move |bytes: Vec<u8>| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TransformError>(bytes[..bytes.len() / 2].to_vec())
                }
            })
            .filename(|name: &str| format!("{name}.half"))
    }

    fn orchestrator(
        raw: Vec<RawTransformConfig>,
        cache_dir: &std::path::Path,
    ) -> TransformOrchestrator {
        let defaults = ConfigDefaults::with_cache_dir(cache_dir);
        TransformOrchestrator::new(Arc::new(ConfigSet::normalize(raw, &defaults)))
    }

    fn snapshot(entries: &[(&str, &str)]) -> Vec<(String, Asset)> {
        entries
            .iter()
            .map(|(name, body)| ((*name).to_string(), Asset::from(*body)))
            .collect()
    }

    #[tokio::test]
    async fn converts_matching_assets() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![halve(Arc::clone(&calls))], dir.path());
        let sink = MapSink::default();

        let report = orch
            .process(&sink, &snapshot(&[("notes.txt", "abcdefgh"), ("app.js", "x")]))
            .await
            .unwrap();

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.unmatched, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sink.0.get("notes.half").unwrap().source(), b"abcd");
        assert!(!sink.0.contains_key("app.js"));
    }

    #[tokio::test]
    async fn second_pass_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![halve(Arc::clone(&calls))], dir.path());
        let assets = snapshot(&[("notes.txt", "abcdefgh")]);

        let first = orch.process(&MapSink::default(), &assets).await.unwrap();
        let second = orch.process(&MapSink::default(), &assets).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.records[0].cache_hit);
        assert!(second.records[0].cache_hit);
        assert_eq!(first.total_delta(), second.total_delta());
    }

    #[tokio::test]
    async fn disabled_cache_always_converts() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![halve(Arc::clone(&calls)).cache(false)], dir.path());
        let assets = snapshot(&[("notes.txt", "abcdefgh")]);

        orch.process(&MapSink::default(), &assets).await.unwrap();
        orch.process(&MapSink::default(), &assets).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn bounded_concurrency_processes_every_pair() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![halve(Arc::clone(&calls))], dir.path())
            .with_options(OrchestratorOptions::new().with_max_concurrency(2));
        let sink = MapSink::default();
        let assets = snapshot(&[
            ("a.txt", "aaaa"),
            ("b.txt", "bbbbbb"),
            ("c.txt", "cccccccc"),
            ("d.css", "dd"),
        ]);

        let report = orch.process(&sink, &assets).await.unwrap();

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.unmatched, 1);
        assert_eq!(sink.0.len(), 3);
    }

    #[tokio::test]
    async fn transform_failure_aborts_pass() {
        let dir = tempfile::tempdir().unwrap();
        let failing = TransformConfig::builder()
            .test_fn(|name: &str| name.ends_with(".txt"))
            .convert_fn(|_bytes: Vec<u8>| async move {
                Err::<Vec<u8>, _>(TransformError::msg("unsupported"))
            })
            .filename(|name: &str| name.to_string());
        let orch = orchestrator(vec![failing], dir.path());

        let err = orch
            .process(&MapSink::default(), &snapshot(&[("notes.txt", "abc")]))
            .await
            .unwrap_err();

        assert!(err.is_transform_failure());
        assert!(err.to_string().contains("notes.txt"));
    }

    fn to_fixed(body: &'static [u8], cache_dir: &std::path::Path) -> RawTransformConfig {
        TransformConfig::builder()
            .test_fn(|_name: &str| true)
            .convert_fn(move |_bytes: Vec<u8>| async move {
                Ok::<_, TransformError>(body.to_vec())
            })
            .filename(|_name: &str| "bundle.out".to_string())
            .cache_dir(cache_dir)
    }

    #[tokio::test]
    async fn collision_is_last_registered_wins() {
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let raw = vec![
            to_fixed(b"first".as_slice(), first_dir.path()),
            to_fixed(b"second".as_slice(), second_dir.path()),
        ];
        let orch = orchestrator(raw, first_dir.path())
            .with_options(OrchestratorOptions::new().with_max_concurrency(1));
        let sink = MapSink::default();

        let report = orch
            .process(&sink, &snapshot(&[("in.txt", "input")]))
            .await
            .unwrap();

        assert_eq!(
            report.collisions,
            vec![NameCollision {
                name: "bundle.out".to_string(),
                asset: "in.txt".to_string(),
            }]
        );
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0.get("bundle.out").unwrap().source(), b"second");
    }

    #[tokio::test]
    async fn shared_cache_dir_reuses_first_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let raw = vec![
            to_fixed(b"first".as_slice(), dir.path()),
            to_fixed(b"second".as_slice(), dir.path()),
        ];
        let orch = orchestrator(raw, dir.path())
            .with_options(OrchestratorOptions::new().with_max_concurrency(1));
        let sink = MapSink::default();

        let report = orch
            .process(&sink, &snapshot(&[("in.txt", "input")]))
            .await
            .unwrap();

        // Same input bytes, same address: the second config is served the
        // first config's output.
        assert_eq!(report.cache_hits(), 1);
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(sink.0.get("bundle.out").unwrap().source(), b"first");
    }
}
