use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::provisioning::EnsureOutcome;
use crate::types::NamespacePath;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (something was skipped or cleaned, the run continues).
    Warning,
    /// Error-level event (a row or table failed).
    Error,
    /// Critical error (a whole dataset could not be read, or the store is unusable).
    Critical,
}

/// Something that happened during an import run.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    DatasetStarted {
        dataset: String,
        source: String,
        tables: usize,
    },
    DatasetFailed {
        source: String,
        error: String,
    },
    TableSkipped {
        dataset: String,
        table: String,
        reason: String,
    },
    MixedColumn {
        dataset: String,
        table: String,
        column: String,
        shapes: String,
    },
    TableCleaned {
        dataset: String,
        table: String,
        columns: Vec<String>,
        values_replaced: usize,
    },
    NamespaceEnsured {
        path: NamespacePath,
        outcome: EnsureOutcome,
    },
    ProvisioningFailed {
        path: NamespacePath,
        error: String,
    },
    RowFailed {
        table: String,
        key: String,
        error: String,
    },
    Progress {
        table: String,
        done: usize,
        total: usize,
    },
    TableFinished {
        path: NamespacePath,
        success_count: usize,
        error_count: usize,
    },
    TableCancelled {
        dataset: String,
        table: String,
    },
    DatasetFinished {
        dataset: String,
        tables_succeeded: usize,
        tables_failed: usize,
        documents_loaded: usize,
    },
}

impl ImportEvent {
    /// Severity the orchestrator reports this event with.
    pub fn severity(&self) -> ImportSeverity {
        match self {
            Self::DatasetFailed { .. } => ImportSeverity::Critical,
            Self::ProvisioningFailed { .. } | Self::RowFailed { .. } => ImportSeverity::Error,
            Self::TableSkipped { .. }
            | Self::MixedColumn { .. }
            | Self::TableCleaned { .. }
            | Self::TableCancelled { .. } => ImportSeverity::Warning,
            Self::TableFinished { error_count, .. } if *error_count > 0 => ImportSeverity::Warning,
            _ => ImportSeverity::Info,
        }
    }
}

impl fmt::Display for ImportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatasetStarted {
                dataset,
                source,
                tables,
            } => write!(f, "dataset={dataset} source={source} tables={tables} started"),
            Self::DatasetFailed { source, error } => {
                write!(f, "source={source} failed err={error}")
            }
            Self::TableSkipped {
                dataset,
                table,
                reason,
            } => write!(f, "dataset={dataset} table={table} skipped: {reason}"),
            Self::MixedColumn {
                dataset,
                table,
                column,
                shapes,
            } => write!(
                f,
                "dataset={dataset} table={table} column={column} mixed shapes [{shapes}]"
            ),
            Self::TableCleaned {
                dataset,
                table,
                columns,
                values_replaced,
            } => write!(
                f,
                "dataset={dataset} table={table} cleaned columns={columns:?} values_replaced={values_replaced}"
            ),
            Self::NamespaceEnsured { path, outcome } => {
                write!(f, "namespace={path} ensured ({outcome:?})")
            }
            Self::ProvisioningFailed { path, error } => {
                write!(f, "namespace={path} provisioning failed err={error}")
            }
            Self::RowFailed { table, key, error } => {
                write!(f, "table={table} key={key} upsert failed err={error}")
            }
            Self::Progress { table, done, total } => {
                write!(f, "table={table} progress {done}/{total}")
            }
            Self::TableFinished {
                path,
                success_count,
                error_count,
            } => write!(
                f,
                "namespace={path} loaded ok={success_count} errors={error_count}"
            ),
            Self::TableCancelled { dataset, table } => {
                write!(f, "dataset={dataset} table={table} cancelled before start")
            }
            Self::DatasetFinished {
                dataset,
                tables_succeeded,
                tables_failed,
                documents_loaded,
            } => write!(
                f,
                "dataset={dataset} finished tables_ok={tables_succeeded} tables_failed={tables_failed} documents={documents_loaded}"
            ),
        }
    }
}

/// Observer interface for import events.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait ImportObserver: Send + Sync {
    /// Called for every event.
    fn on_event(&self, _severity: ImportSeverity, _event: &ImportEvent) {}

    /// Called when an event meets the configured alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_event`].
    fn on_alert(&self, severity: ImportSeverity, event: &ImportEvent) {
        self.on_event(severity, event)
    }
}

/// Delivers events to an optional observer, raising alerts at or above a threshold.
#[derive(Clone)]
pub struct EventSink {
    observer: Option<Arc<dyn ImportObserver>>,
    alert_at_or_above: ImportSeverity,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(None, ImportSeverity::Critical)
    }
}

impl EventSink {
    pub fn new(observer: Option<Arc<dyn ImportObserver>>, alert_at_or_above: ImportSeverity) -> Self {
        Self {
            observer,
            alert_at_or_above,
        }
    }

    /// Report `event` with its own severity.
    pub fn emit(&self, event: ImportEvent) {
        if let Some(obs) = self.observer.as_ref() {
            let severity = event.severity();
            obs.on_event(severity, &event);
            if severity >= self.alert_at_or_above {
                obs.on_alert(severity, &event);
            }
        }
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ImportObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn ImportObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ImportObserver for CompositeObserver {
    fn on_event(&self, severity: ImportSeverity, event: &ImportEvent) {
        for o in &self.observers {
            o.on_event(severity, event);
        }
    }

    fn on_alert(&self, severity: ImportSeverity, event: &ImportEvent) {
        for o in &self.observers {
            o.on_alert(severity, event);
        }
    }
}

/// Logs import events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl ImportObserver for StdErrObserver {
    fn on_event(&self, severity: ImportSeverity, event: &ImportEvent) {
        eprintln!("[import][{severity:?}] {event}");
    }

    fn on_alert(&self, severity: ImportSeverity, event: &ImportEvent) {
        eprintln!("[ALERT][import][{severity:?}] {event}");
    }
}

/// Forwards import events to `tracing`, mapping severity to level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ImportObserver for TracingObserver {
    fn on_event(&self, severity: ImportSeverity, event: &ImportEvent) {
        match severity {
            ImportSeverity::Info => tracing::info!(target: "docstore_import", "{event}"),
            ImportSeverity::Warning => tracing::warn!(target: "docstore_import", "{event}"),
            ImportSeverity::Error | ImportSeverity::Critical => {
                tracing::error!(target: "docstore_import", ?severity, "{event}")
            }
        }
    }

    fn on_alert(&self, severity: ImportSeverity, event: &ImportEvent) {
        tracing::error!(target: "docstore_import", alert = true, ?severity, "{event}");
    }
}

/// Appends import events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl ImportObserver for FileObserver {
    fn on_event(&self, severity: ImportSeverity, event: &ImportEvent) {
        self.append_line(&format!("{} {severity:?} {event}", unix_ts()));
    }

    fn on_alert(&self, severity: ImportSeverity, event: &ImportEvent) {
        self.append_line(&format!("{} ALERT {severity:?} {event}", unix_ts()));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
