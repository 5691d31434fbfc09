//! Running imports: datasets in, an [`ImportReport`] out.
//!
//! This module sits "above" [`crate::processing`], [`crate::provisioning`] and [`crate::loading`]
//! and provides:
//!
//! - The per-dataset pipeline (clean, ensure namespaces, load) with failure isolation at row,
//!   table and dataset level
//! - Optional table-level parallelism on a bounded rayon pool
//! - Cooperative cancellation between tables
//! - Real-time metrics + observer hooks for monitoring
//!
//! ```rust
//! use std::sync::Arc;
//! use docstore_import::config::ImportConfig;
//! use docstore_import::execution::ImportOrchestrator;
//! use docstore_import::ingestion::read_dataset_from_str;
//! use docstore_import::store::MemoryStore;
//! use docstore_import::types::NamespacePath;
//!
//! let mut config = ImportConfig::default().without_delays();
//! config.cleaning.enabled = true;
//!
//! let store = Arc::new(MemoryStore::new());
//! let orchestrator = ImportOrchestrator::new(store.clone(), config).unwrap();
//!
//! let ds = read_dataset_from_str(
//!     "t_dataset",
//!     "t_dataset.json",
//!     r#"{"t": [{"id": 1, "amount": ""}, {"id": 2, "amount": 5}]}"#,
//! )
//! .unwrap();
//! let report = orchestrator.import_datasets(vec![ds]);
//!
//! assert_eq!(report.totals().documents_loaded, 2);
//! let doc = store
//!     .document(&NamespacePath::new("t_dataset", "spider2", "t"), "t_1")
//!     .unwrap();
//! assert!(doc["amount"].is_null());
//! ```

mod metrics;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ImportConfig;
use crate::error::{ImportError, ImportResult};
use crate::ingestion::json::dataset_identity;
use crate::ingestion::{EventSink, ImportEvent, ImportObserver, discover_dataset_files, read_dataset_from_path};
use crate::loading::DocumentLoader;
use crate::processing::{analyze_dataset, backup_then_rewrite, normalize_dataset, shapes_label};
use crate::provisioning::{CreationStrategy, NamespaceProvisioner, path_for_table};
use crate::report::{DatasetReport, ImportReport, TableOutcome, TableReport};
use crate::store::DocumentStore;
use crate::types::{Dataset, NamespacePath, Table};

pub use metrics::{ImportMetrics, ImportMetricsSnapshot};

/// Configuration for how an [`ImportOrchestrator`] schedules work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Upper bound on tables of one dataset loading at the same time.
    ///
    /// `1` processes tables sequentially on the calling thread.
    pub max_concurrent_tables: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_concurrent_tables: 1,
        }
    }
}

/// Cooperative stop signal for a running import.
///
/// Checked before each table starts: a table already loading finishes, tables not yet started
/// are reported as [`TableOutcome::Cancelled`]. A cancel applies to the run in progress, or to the
/// next run if none is active, and is cleared when that run ends.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Imports datasets into a [`DocumentStore`].
pub struct ImportOrchestrator {
    config: ImportConfig,
    provisioner: NamespaceProvisioner,
    loader: DocumentLoader,
    events: EventSink,
    metrics: Arc<ImportMetrics>,
    cancel: CancellationToken,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for ImportOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOrchestrator")
            .field("config", &self.config)
            .field("provisioner", &self.provisioner)
            .field("events", &self.events)
            .field("parallel", &self.pool.is_some())
            .finish()
    }
}

impl ImportOrchestrator {
    /// Create an orchestrator for `store`.
    ///
    /// Fails if the configuration is invalid or the worker pool cannot be built.
    pub fn new(store: Arc<dyn DocumentStore>, config: ImportConfig) -> ImportResult<Self> {
        config.validate()?;

        let pool = if config.execution.max_concurrent_tables > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.execution.max_concurrent_tables)
                .thread_name(|i| format!("docstore-import-{i}"))
                .build()
                .map_err(|e| ImportError::Config {
                    message: format!("failed to build worker pool: {e}"),
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            provisioner: NamespaceProvisioner::new(Arc::clone(&store), &config),
            loader: DocumentLoader::new(store, &config),
            events: EventSink::new(None, config.alert_at_or_above),
            metrics: Arc::new(ImportMetrics::new()),
            cancel: CancellationToken::new(),
            pool,
            config,
        })
    }

    /// Attach an observer for import events (logging/alerting).
    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.events = EventSink::new(Some(observer), self.config.alert_at_or_above);
        self
    }

    /// Replace the ordered namespace creation strategies.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn CreationStrategy>>) -> Self {
        self.provisioner = self.provisioner.with_strategies(strategies);
        self
    }

    /// Get a handle to real-time import metrics.
    pub fn metrics(&self) -> Arc<ImportMetrics> {
        Arc::clone(&self.metrics)
    }

    /// A token that stops this orchestrator's runs between tables.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import one in-memory dataset.
    pub fn import_dataset(&self, dataset: Dataset) -> DatasetReport {
        self.run(|| self.import_one(dataset, None))
    }

    /// Import several in-memory datasets, in order.
    pub fn import_datasets(&self, datasets: Vec<Dataset>) -> ImportReport {
        self.run(|| ImportReport {
            datasets: datasets.into_iter().map(|ds| self.import_one(ds, None)).collect(),
        })
    }

    /// Read and import one dataset file.
    ///
    /// A file that cannot be read or parsed yields a failed [`DatasetReport`] rather than an error.
    pub fn import_file(&self, path: impl AsRef<Path>) -> DatasetReport {
        self.run(|| self.import_path(path.as_ref()))
    }

    /// Import every `*.json` dataset file in `dir`, in sorted path order.
    ///
    /// Only failing to list `dir` is an error; a bad file is recorded and the run continues.
    pub fn import_directory(&self, dir: impl AsRef<Path>, recursive: bool) -> ImportResult<ImportReport> {
        let files = discover_dataset_files(dir, recursive)?;
        tracing::debug!(files = files.len(), "discovered dataset files");
        Ok(self.run(|| ImportReport {
            datasets: files.iter().map(|f| self.import_path(&f.path)).collect(),
        }))
    }

    fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        self.metrics.begin_run();
        let out = f();
        self.cancel.reset();
        self.metrics.end_run();
        tracing::debug!(metrics = %self.metrics.snapshot(), "import run finished");
        out
    }

    fn import_path(&self, path: &Path) -> DatasetReport {
        match read_dataset_from_path(path) {
            Ok(dataset) => self.import_one(dataset, Some(path)),
            Err(e) => {
                let (name, source) = dataset_identity(path)
                    .unwrap_or_else(|_| (path.display().to_string(), path.display().to_string()));
                self.events.emit(ImportEvent::DatasetFailed {
                    source: source.clone(),
                    error: e.to_string(),
                });
                DatasetReport::failed(name, source, e.to_string())
            }
        }
    }

    fn import_one(&self, mut dataset: Dataset, source_path: Option<&Path>) -> DatasetReport {
        self.metrics.on_dataset_start();
        self.events.emit(ImportEvent::DatasetStarted {
            dataset: dataset.name.clone(),
            source: dataset.source.clone(),
            tables: dataset.tables.len(),
        });
        let mut report = DatasetReport::new(&dataset.name, &dataset.source);

        for skipped in &dataset.skipped {
            self.events.emit(ImportEvent::TableSkipped {
                dataset: dataset.name.clone(),
                table: skipped.name.clone(),
                reason: skipped.reason.clone(),
            });
        }

        if self.config.cleaning.enabled {
            self.clean(&mut dataset, source_path, &mut report);
        }

        let namespace = &self.config.namespace;
        let work: Vec<(&Table, NamespacePath)> = dataset
            .tables
            .values()
            .map(|t| {
                let path = path_for_table(
                    &dataset.name,
                    &t.name,
                    &namespace.sub_container,
                    namespace.separate_leaf_containers,
                );
                (t, path)
            })
            .collect();

        let parent_failures = if self.cancel.is_cancelled() {
            HashMap::new()
        } else {
            self.ensure_shared_parents(&work)
        };
        if let Some(err) = parent_failures.values().next() {
            report.error = Some(err.clone());
        }

        let source = dataset.source.as_str();
        let process = |(table, path): &(&Table, NamespacePath)| {
            let parent_error = parent_failures.get(&path.sub_container).cloned();
            self.process_table(&dataset.name, source, table, path, parent_error)
        };
        report.tables = match &self.pool {
            Some(pool) => pool.install(|| work.par_iter().map(process).collect()),
            None => work.iter().map(process).collect(),
        };

        report.tables.extend(dataset.skipped.iter().map(|s| {
            TableReport::without_rows(
                &s.name,
                None,
                TableOutcome::Skipped {
                    reason: s.reason.clone(),
                },
            )
        }));

        self.events.emit(ImportEvent::DatasetFinished {
            dataset: dataset.name.clone(),
            tables_succeeded: report.tables_succeeded(),
            tables_failed: report.tables_failed(),
            documents_loaded: report.documents_loaded(),
        });
        report
    }

    /// Analyze and normalize `dataset` in place, optionally persisting the result.
    fn clean(&self, dataset: &mut Dataset, source_path: Option<&Path>, report: &mut DatasetReport) {
        let mixed = analyze_dataset(dataset);
        for (table, columns) in &mixed.tables {
            for c in columns {
                self.events.emit(ImportEvent::MixedColumn {
                    dataset: dataset.name.clone(),
                    table: table.clone(),
                    column: c.column.clone(),
                    shapes: shapes_label(&c.shapes),
                });
            }
        }

        let dry_run = self.config.cleaning.dry_run;
        let cleaning = normalize_dataset(dataset, dry_run);
        for (table, cleaned) in &cleaning.tables {
            self.events.emit(ImportEvent::TableCleaned {
                dataset: dataset.name.clone(),
                table: table.clone(),
                columns: cleaned.columns.clone(),
                values_replaced: cleaned.values_replaced,
            });
        }

        let persist = self.config.cleaning.rewrite_source_files && !dry_run && cleaning.stats.values_replaced > 0;
        if let (true, Some(path)) = (persist, source_path) {
            match backup_then_rewrite(dataset, path) {
                Ok(backup) => report.backup_created = backup,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to rewrite cleaned dataset file"),
            }
        }

        report.cleaning = Some(cleaning.stats);
        report.mixed_columns = Some(mixed);
    }

    /// Ensure container and sub-container once per distinct sub-container before tables fan
    /// out. Returns the error for each sub-container that could not be ensured.
    fn ensure_shared_parents(&self, work: &[(&Table, NamespacePath)]) -> HashMap<String, String> {
        let mut failures = HashMap::new();
        let mut seen: Vec<&str> = Vec::new();
        for (_, path) in work {
            if seen.contains(&path.sub_container.as_str()) {
                continue;
            }
            seen.push(&path.sub_container);
            if let Err(e) = self.provisioner.ensure_parents(path) {
                self.events.emit(ImportEvent::ProvisioningFailed {
                    path: path.clone(),
                    error: e.to_string(),
                });
                failures.insert(path.sub_container.clone(), e.to_string());
            }
        }
        failures
    }

    fn process_table(
        &self,
        dataset: &str,
        source: &str,
        table: &Table,
        path: &NamespacePath,
        parent_error: Option<String>,
    ) -> TableReport {
        if self.cancel.is_cancelled() {
            self.events.emit(ImportEvent::TableCancelled {
                dataset: dataset.to_string(),
                table: table.name.clone(),
            });
            return TableReport::without_rows(&table.name, Some(path.clone()), TableOutcome::Cancelled);
        }
        if let Some(error) = parent_error {
            return TableReport::without_rows(
                &table.name,
                Some(path.clone()),
                TableOutcome::ProvisioningFailed { error },
            );
        }

        self.metrics.on_table_start();
        match self.provisioner.ensure(path) {
            Ok(outcome) => {
                self.events.emit(ImportEvent::NamespaceEnsured {
                    path: path.clone(),
                    outcome,
                });
                let stats = self.loader.load_table(path, table, source, &self.events);
                self.metrics.on_table_end(stats.success_count, stats.error_count);
                TableReport::loaded(&table.name, path.clone(), stats)
            }
            Err(e) => {
                self.metrics.on_table_end(0, 0);
                self.events.emit(ImportEvent::ProvisioningFailed {
                    path: path.clone(),
                    error: e.to_string(),
                });
                TableReport::without_rows(
                    &table.name,
                    Some(path.clone()),
                    TableOutcome::ProvisioningFailed { error: e.to_string() },
                )
            }
        }
    }
}
