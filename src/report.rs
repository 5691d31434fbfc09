//! Outcome of an import run.
//!
//! An [`ImportReport`] always comes back, whatever failed: one [`DatasetReport`] per dataset
//! attempted, one [`TableReport`] per table declared in it. Totals are derived from the per-table
//! entries, so the breakdown and the summary can never disagree.

use std::fmt;
use std::path::Path;

use crate::error::ImportResult;
use crate::loading::{LoadStats, RowFailure};
use crate::processing::{CleaningStats, MixedColumnReport};
use crate::types::NamespacePath;

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// The namespace was ensured and every row was attempted.
    Loaded,
    /// Every creation strategy failed; no rows were attempted.
    ProvisioningFailed { error: String },
    /// The table's shape was not recognized on read.
    Skipped { reason: String },
    /// The run was cancelled before this table started.
    Cancelled,
}

impl TableOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::ProvisioningFailed { .. } => "provisioning_failed",
            Self::Skipped { .. } => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    fn detail(&self) -> &str {
        match self {
            Self::ProvisioningFailed { error } => error,
            Self::Skipped { reason } => reason,
            Self::Loaded | Self::Cancelled => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub table: String,
    /// Target namespace. `None` for tables that never got one (skipped on read).
    pub path: Option<NamespacePath>,
    pub outcome: TableOutcome,
    pub success_count: usize,
    pub error_count: usize,
    /// First few row failures, capped by `LoaderConfig::max_reported_failures`.
    pub failures: Vec<RowFailure>,
}

impl TableReport {
    pub fn loaded(table: impl Into<String>, path: NamespacePath, stats: LoadStats) -> Self {
        Self {
            table: table.into(),
            path: Some(path),
            outcome: TableOutcome::Loaded,
            success_count: stats.success_count,
            error_count: stats.error_count,
            failures: stats.failures,
        }
    }

    pub fn without_rows(table: impl Into<String>, path: Option<NamespacePath>, outcome: TableOutcome) -> Self {
        Self {
            table: table.into(),
            path,
            outcome,
            success_count: 0,
            error_count: 0,
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == TableOutcome::Loaded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatasetReport {
    pub name: String,
    pub source: String,
    /// Set when cleaning ran for this dataset.
    pub cleaning: Option<CleaningStats>,
    pub mixed_columns: Option<MixedColumnReport>,
    /// Backup created by rewriting the source file in this run.
    pub backup_created: Option<std::path::PathBuf>,
    pub tables: Vec<TableReport>,
    /// Set when the dataset could not be read or its shared namespace levels could not be
    /// ensured. Such a dataset may have no table entries.
    pub error: Option<String>,
}

impl DatasetReport {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn failed(name: impl Into<String>, source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(name, source)
        }
    }

    pub fn tables_succeeded(&self) -> usize {
        self.tables.iter().filter(|t| t.succeeded()).count()
    }

    pub fn tables_failed(&self) -> usize {
        self.count_outcome(|o| matches!(o, TableOutcome::ProvisioningFailed { .. }))
    }

    pub fn tables_skipped(&self) -> usize {
        self.count_outcome(|o| matches!(o, TableOutcome::Skipped { .. }))
    }

    pub fn tables_cancelled(&self) -> usize {
        self.count_outcome(|o| matches!(o, TableOutcome::Cancelled))
    }

    pub fn documents_loaded(&self) -> usize {
        self.tables.iter().map(|t| t.success_count).sum()
    }

    pub fn documents_failed(&self) -> usize {
        self.tables.iter().map(|t| t.error_count).sum()
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    fn count_outcome(&self, pred: impl Fn(&TableOutcome) -> bool) -> usize {
        self.tables.iter().filter(|t| pred(&t.outcome)).count()
    }
}

/// Run-level totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportTotals {
    pub datasets_processed: usize,
    pub datasets_failed: usize,
    pub tables_succeeded: usize,
    pub tables_failed: usize,
    pub tables_skipped: usize,
    pub tables_cancelled: usize,
    pub documents_loaded: usize,
    pub documents_failed: usize,
    pub values_replaced: usize,
}

impl ImportTotals {
    /// Tables that were attempted (succeeded or failed).
    pub fn tables_processed(&self) -> usize {
        self.tables_succeeded + self.tables_failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    pub datasets: Vec<DatasetReport>,
}

impl ImportReport {
    pub fn dataset(&self, name: &str) -> Option<&DatasetReport> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn totals(&self) -> ImportTotals {
        let mut t = ImportTotals::default();
        for d in &self.datasets {
            t.datasets_processed += 1;
            if d.error.is_some() {
                t.datasets_failed += 1;
            }
            t.tables_succeeded += d.tables_succeeded();
            t.tables_failed += d.tables_failed();
            t.tables_skipped += d.tables_skipped();
            t.tables_cancelled += d.tables_cancelled();
            t.documents_loaded += d.documents_loaded();
            t.documents_failed += d.documents_failed();
            t.values_replaced += d.cleaning.map(|c| c.values_replaced).unwrap_or(0);
        }
        t
    }

    /// `true` if nothing failed: no dataset errors, no table failures, no row failures.
    pub fn is_clean(&self) -> bool {
        let t = self.totals();
        t.datasets_failed == 0 && t.tables_failed == 0 && t.documents_failed == 0
    }

    /// Write the per-table breakdown as CSV, one row per table.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> ImportResult<()> {
        let mut w = csv::Writer::from_path(path)?;
        w.write_record([
            "dataset",
            "source",
            "table",
            "namespace",
            "outcome",
            "documents_loaded",
            "documents_failed",
            "detail",
        ])?;
        for d in &self.datasets {
            if d.tables.is_empty() {
                if let Some(err) = &d.error {
                    w.write_record([
                        d.name.as_str(),
                        d.source.as_str(),
                        "",
                        "",
                        "dataset_failed",
                        "0",
                        "0",
                        err.as_str(),
                    ])?;
                }
                continue;
            }
            for t in &d.tables {
                let namespace = t.path.as_ref().map(|p| p.to_string()).unwrap_or_default();
                let loaded = t.success_count.to_string();
                let failed = t.error_count.to_string();
                w.write_record([
                    d.name.as_str(),
                    d.source.as_str(),
                    t.table.as_str(),
                    namespace.as_str(),
                    t.outcome.as_str(),
                    loaded.as_str(),
                    failed.as_str(),
                    t.outcome.detail(),
                ])?;
            }
        }
        w.flush()?;
        Ok(())
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.datasets {
            match &d.error {
                Some(err) => writeln!(f, "{} ({}): FAILED {err}", d.name, d.source)?,
                None => writeln!(f, "{} ({})", d.name, d.source)?,
            }
            if let Some(c) = &d.cleaning {
                writeln!(
                    f,
                    "  cleaned: tables={} columns={} values_replaced={}",
                    c.tables_processed, c.columns_cleaned, c.values_replaced
                )?;
            }
            for t in &d.tables {
                let target = t.path.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                write!(f, "  {} -> {target}: {}", t.table, t.outcome.as_str())?;
                if t.succeeded() {
                    write!(f, " ok={} errors={}", t.success_count, t.error_count)?;
                }
                let detail = t.outcome.detail();
                if !detail.is_empty() {
                    write!(f, " ({detail})")?;
                }
                writeln!(f)?;
            }
        }
        let t = self.totals();
        writeln!(f, "datasets processed: {} (failed: {})", t.datasets_processed, t.datasets_failed)?;
        writeln!(
            f,
            "tables processed: {} (succeeded: {}, failed: {}, skipped: {}, cancelled: {})",
            t.tables_processed(),
            t.tables_succeeded,
            t.tables_failed,
            t.tables_skipped,
            t.tables_cancelled
        )?;
        write!(f, "documents loaded: {} (failed: {})", t.documents_loaded, t.documents_failed)
    }
}
