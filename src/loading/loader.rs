//! Row-by-row document upserts with failure accounting.

use std::sync::Arc;

use crate::config::{ImportConfig, RetryPolicy};
use crate::error::StoreError;
use crate::ingestion::{EventSink, ImportEvent};
use crate::store::DocumentStore;
use crate::types::{Document, NamespacePath, Table};

use super::keys::KeyDeriver;

/// A row that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based row position.
    pub index: usize,
    pub key: String,
    pub error: StoreError,
}

/// Outcome of loading one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub success_count: usize,
    pub error_count: usize,
    /// The first few failures, with detail. `error_count` counts all of them.
    pub failures: Vec<RowFailure>,
}

/// Writes a table's rows as documents into a provisioned leaf container.
pub struct DocumentLoader {
    store: Arc<dyn DocumentStore>,
    keys: KeyDeriver,
    retry: RetryPolicy,
    max_reported_failures: usize,
    progress_interval: usize,
}

impl std::fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("keys", &self.keys)
            .field("retry", &self.retry)
            .field("max_reported_failures", &self.max_reported_failures)
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

impl DocumentLoader {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ImportConfig) -> Self {
        Self {
            store,
            keys: KeyDeriver::new(config.loader.alternate_key_fields.clone()),
            retry: config.retry.clone(),
            max_reported_failures: config.loader.max_reported_failures,
            progress_interval: config.loader.progress_interval.max(1),
        }
    }

    /// Upsert every row of `table` into `path`.
    ///
    /// A failing row is counted and skipped; the rest of the table is still written. Only the
    /// first `max_reported_failures` failures are kept and reported in detail.
    pub fn load_table(&self, path: &NamespacePath, table: &Table, source: &str, events: &EventSink) -> LoadStats {
        let mut stats = LoadStats::default();
        let total = table.row_count();
        let prefix = table.key_prefix();

        for (idx0, row) in table.rows.iter().enumerate() {
            let index = idx0 + 1;
            let key = self.keys.derive(prefix, row, index);
            let document = Document::from_row(key, row, &table.name, source);

            match self.retry.run(|| self.store.upsert(path, &document)) {
                Ok(()) => stats.success_count += 1,
                Err(error) => {
                    stats.error_count += 1;
                    if stats.failures.len() < self.max_reported_failures {
                        events.emit(ImportEvent::RowFailed {
                            table: table.name.clone(),
                            key: document.key.clone(),
                            error: error.to_string(),
                        });
                        stats.failures.push(RowFailure {
                            index,
                            key: document.key,
                            error,
                        });
                    }
                }
            }

            if index % self.progress_interval == 0 {
                events.emit(ImportEvent::Progress {
                    table: table.name.clone(),
                    done: index,
                    total,
                });
            }
        }

        events.emit(ImportEvent::TableFinished {
            path: path.clone(),
            success_count: stats.success_count,
            error_count: stats.error_count,
        });
        stats
    }
}
