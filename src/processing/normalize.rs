//! Empty-string-to-null normalization for numeric columns.
//!
//! A column is rewritten only when it holds numbers *and* empty strings; every empty string in
//! such a column becomes null. Nothing else is touched, and running the normalizer again on its
//! own output replaces nothing.

use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::ImportResult;
use crate::ingestion::json::{read_dataset_from_path, write_dataset_to_path};
use crate::types::{Dataset, Table, Value};

use super::classify::{Shape, analyze_table, is_numeric_column};

/// Counters reported by the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    /// Non-empty tables examined.
    pub tables_processed: usize,
    /// Numeric columns that contained empty strings.
    pub columns_cleaned: usize,
    /// Empty strings replaced (or, in a dry run, that would be replaced) with null.
    pub values_replaced: usize,
}

impl AddAssign for CleaningStats {
    fn add_assign(&mut self, rhs: Self) {
        self.tables_processed += rhs.tables_processed;
        self.columns_cleaned += rhs.columns_cleaned;
        self.values_replaced += rhs.values_replaced;
    }
}

/// What the normalizer did to one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCleaning {
    pub columns: Vec<String>,
    pub values_replaced: usize,
}

/// Numeric columns of `table` that contain empty strings.
pub fn columns_to_clean(table: &Table) -> Vec<String> {
    analyze_table(table)
        .into_iter()
        .filter(|(_, shapes)| is_numeric_column(shapes) && shapes.contains(&Shape::EmptyText))
        .map(|(column, _)| column)
        .collect()
}

/// Replace empty strings with null in the numeric columns of `table`.
///
/// With `dry_run`, only counts.
pub fn normalize_table(table: &mut Table, dry_run: bool) -> TableCleaning {
    let columns = columns_to_clean(table);
    if columns.is_empty() {
        return TableCleaning::default();
    }

    let mut values_replaced = 0;
    for row in &mut table.rows {
        for column in &columns {
            if let Some(value) = row.get_mut(column) {
                if value.is_empty_text() {
                    if !dry_run {
                        *value = Value::Null;
                    }
                    values_replaced += 1;
                }
            }
        }
    }

    TableCleaning {
        columns,
        values_replaced,
    }
}

/// Result of normalizing a whole dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetCleaning {
    pub stats: CleaningStats,
    /// Tables with at least one cleaned column.
    pub tables: IndexMap<String, TableCleaning>,
}

/// Normalize every table of a dataset in place.
pub fn normalize_dataset(dataset: &mut Dataset, dry_run: bool) -> DatasetCleaning {
    let mut out = DatasetCleaning::default();
    for table in dataset.tables.values_mut() {
        if table.rows.is_empty() {
            continue;
        }
        out.stats.tables_processed += 1;

        let cleaned = normalize_table(table, dry_run);
        if cleaned.columns.is_empty() {
            continue;
        }
        out.stats.columns_cleaned += cleaned.columns.len();
        out.stats.values_replaced += cleaned.values_replaced;
        out.tables.insert(table.name.clone(), cleaned);
    }
    out
}

/// Where the one-time backup of a dataset file lives (`orders.json` -> `orders.json.backup`).
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".backup");
    path.with_file_name(name)
}

/// Rewrite `path` with `dataset`, copying the current file to its backup first.
///
/// The backup is created only if none exists, so it always holds the file as it was before the
/// first rewrite. Returns the backup path if this call created it.
pub fn backup_then_rewrite(dataset: &Dataset, path: &Path) -> ImportResult<Option<PathBuf>> {
    let backup = backup_path_for(path);
    let created = if backup.exists() {
        None
    } else {
        std::fs::copy(path, &backup)?;
        Some(backup)
    };
    write_dataset_to_path(dataset, path)?;
    Ok(created)
}

/// Outcome of [`clean_dataset_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCleaning {
    pub dataset: String,
    pub cleaning: DatasetCleaning,
    /// `true` if the file was rewritten.
    pub rewritten: bool,
    /// Set when this run created the backup.
    pub backup_created: Option<PathBuf>,
}

/// Normalize a dataset file on disk.
///
/// The file is rewritten only when values were replaced and `dry_run` is off.
pub fn clean_dataset_file(path: impl AsRef<Path>, dry_run: bool) -> ImportResult<FileCleaning> {
    let path = path.as_ref();
    let mut dataset = read_dataset_from_path(path)?;
    let cleaning = normalize_dataset(&mut dataset, dry_run);

    let mut rewritten = false;
    let mut backup_created = None;
    if cleaning.stats.values_replaced > 0 && !dry_run {
        backup_created = backup_then_rewrite(&dataset, path)?;
        rewritten = true;
    }

    Ok(FileCleaning {
        dataset: dataset.name,
        cleaning,
        rewritten,
        backup_created,
    })
}
