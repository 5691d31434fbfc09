//! JSON dataset files.
//!
//! Supported inputs (one file = one [`Dataset`]):
//! - A mapping of table name to rows: `{"orders": [{"id": 1}, {"id": 2}]}`
//! - A mapping of table name to a wrapper: `{"orders": {"data": [{"id": 1}], "row_count": 1}}`
//! - A top-level array of documents: `[{"id": 1}, {"id": 2}]`, read as a single `_default` table
//!
//! A table entry with any other shape is recorded in [`Dataset::skipped`] and does not fail the
//! file. Writing a dataset back preserves each table's layout and re-emits skipped entries.

use std::fs;
use std::path::Path;

use crate::error::{ImportError, ImportResult};
use crate::types::{DEFAULT_NAMESPACE, Dataset, Row, SkippedTable, Table, TableLayout, Value};

/// Read a dataset file. The dataset is named after the file stem.
pub fn read_dataset_from_path(path: impl AsRef<Path>) -> ImportResult<Dataset> {
    let path = path.as_ref();
    let (name, source) = dataset_identity(path)?;
    let text = fs::read_to_string(path)?;
    read_dataset_from_str(&name, &source, &text)
}

/// Dataset name (file stem) and source identifier (file name) for a path.
pub fn dataset_identity(path: &Path) -> ImportResult<(String, String)> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            ImportError::structural(format!("cannot name dataset from path ({})", path.display()))
        })?;
    let source = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    Ok((name.to_string(), source.to_string()))
}

/// Parse a dataset from JSON text.
pub fn read_dataset_from_str(name: &str, source: &str, input: &str) -> ImportResult<Dataset> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ImportError::structural(format!("dataset '{name}' is empty")));
    }

    let root: serde_json::Value = serde_json::from_str(trimmed)?;
    dataset_from_json(name, source, root)
}

/// Build a dataset from an already parsed JSON document.
pub fn dataset_from_json(name: &str, source: &str, root: serde_json::Value) -> ImportResult<Dataset> {
    let mut dataset = Dataset::new(name, source);

    match root {
        serde_json::Value::Object(entries) => {
            for (table_name, entry) in entries {
                match table_from_entry(&table_name, &entry) {
                    Ok(table) => {
                        dataset.tables.insert(table_name, table);
                    }
                    Err(reason) => dataset.skipped.push(SkippedTable {
                        name: table_name,
                        reason,
                        raw: entry,
                    }),
                }
            }
        }
        serde_json::Value::Array(items) => {
            let rows = rows_from_array(&items).map_err(ImportError::structural)?;
            dataset.tables.insert(
                DEFAULT_NAMESPACE.to_string(),
                Table {
                    name: DEFAULT_NAMESPACE.to_string(),
                    rows,
                    layout: TableLayout::Documents,
                },
            );
        }
        other => {
            return Err(ImportError::structural(format!(
                "dataset '{name}' must be an object of tables or an array of documents, found {}",
                json_type_name(&other)
            )));
        }
    }

    Ok(dataset)
}

fn table_from_entry(name: &str, entry: &serde_json::Value) -> Result<Table, String> {
    match entry {
        serde_json::Value::Array(items) => Ok(Table {
            name: name.to_string(),
            rows: rows_from_array(items)?,
            layout: TableLayout::Rows,
        }),
        serde_json::Value::Object(map) => match map.get("data") {
            Some(serde_json::Value::Array(items)) => {
                let mut metadata = map.clone();
                metadata.remove("data");
                Ok(Table {
                    name: name.to_string(),
                    rows: rows_from_array(items)?,
                    layout: TableLayout::Wrapped { metadata },
                })
            }
            _ => Err(format!(
                "unexpected format (type: object, keys: {:?})",
                map.keys().collect::<Vec<_>>()
            )),
        },
        other => Err(format!("unexpected format (type: {})", json_type_name(other))),
    }
}

fn rows_from_array(items: &[serde_json::Value]) -> Result<Vec<Row>, String> {
    let mut rows = Vec::with_capacity(items.len());
    for (idx0, item) in items.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = item
            .as_object()
            .ok_or_else(|| format!("row {row_num} is not a json object"))?;

        let mut row = Row::with_capacity(obj.len());
        for (column, v) in obj {
            let value = Value::from_json(v)
                .map_err(|e| format!("row {row_num} column '{column}': {e}"))?;
            row.insert(column.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Render a dataset back to JSON in the layout it was read from.
pub fn dataset_to_json(dataset: &Dataset) -> serde_json::Value {
    let documents = dataset
        .tables
        .values()
        .find(|t| t.layout == TableLayout::Documents);
    if let Some(table) = documents {
        return rows_to_json(&table.rows);
    }

    let mut out = serde_json::Map::with_capacity(dataset.tables.len() + dataset.skipped.len());
    for table in dataset.tables.values() {
        let entry = match &table.layout {
            TableLayout::Wrapped { metadata } => {
                let mut wrapped = serde_json::Map::with_capacity(metadata.len() + 1);
                wrapped.insert("data".to_string(), rows_to_json(&table.rows));
                for (k, v) in metadata {
                    wrapped.insert(k.clone(), v.clone());
                }
                serde_json::Value::Object(wrapped)
            }
            TableLayout::Rows | TableLayout::Documents => rows_to_json(&table.rows),
        };
        out.insert(table.name.clone(), entry);
    }
    for skipped in &dataset.skipped {
        out.insert(skipped.name.clone(), skipped.raw.clone());
    }
    serde_json::Value::Object(out)
}

fn rows_to_json(rows: &[Row]) -> serde_json::Value {
    serde_json::Value::Array(
        rows.iter()
            .map(|row| {
                serde_json::Value::Object(
                    row.iter()
                        .map(|(k, v)| (k.clone(), v.to_json()))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Write a dataset to `path` as pretty-printed JSON.
pub fn write_dataset_to_path(dataset: &Dataset, path: impl AsRef<Path>) -> ImportResult<()> {
    let text = serde_json::to_string_pretty(&dataset_to_json(dataset))?;
    fs::write(path, text)?;
    Ok(())
}
