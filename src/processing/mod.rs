//! In-memory type analysis and cleaning of datasets.
//!
//! - [`classify`]: value shapes, per-column shape sets and the mixed-column policy
//! - [`normalize`]: replace empty strings with null in numeric columns
//!
//! ## Example: find and clean a numeric column holding empty strings
//!
//! ```rust
//! use docstore_import::processing::{analyze_dataset, normalize_dataset};
//! use docstore_import::types::{Dataset, Row, Table, Value};
//!
//! let mut first = Row::new();
//! first.insert("id".to_string(), Value::Int64(1));
//! first.insert("amount".to_string(), Value::Utf8(String::new()));
//! let mut second = Row::new();
//! second.insert("id".to_string(), Value::Int64(2));
//! second.insert("amount".to_string(), Value::Int64(5));
//!
//! let mut ds = Dataset::new("t_dataset", "t_dataset.json")
//!     .with_table(Table::new("t", vec![first, second]));
//!
//! assert_eq!(analyze_dataset(&ds).column_count(), 1);
//!
//! let out = normalize_dataset(&mut ds, false);
//! assert_eq!(out.stats.values_replaced, 1);
//! assert_eq!(ds.tables["t"].rows[0]["amount"], Value::Null);
//! ```

pub mod classify;
pub mod normalize;

pub use classify::{
    ColumnShapes, MixedColumn, MixedColumnReport, Shape, analyze_dataset, analyze_table, classify,
    is_mixed, mixed_columns, shapes_label,
};
pub use normalize::{
    CleaningStats, DatasetCleaning, FileCleaning, TableCleaning, backup_path_for,
    backup_then_rewrite, clean_dataset_file, normalize_dataset, normalize_table,
};
