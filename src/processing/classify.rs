//! Value shape classification and mixed-column detection.
//!
//! Loosely typed sources (SQLite type affinity in particular) routinely export an empty string
//! where a numeric column has no value. Classifying every value into a [`Shape`] and collecting
//! the shapes observed per column makes those columns easy to find.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;

use crate::types::{Dataset, Table, Value};

/// Runtime shape of a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Shape {
    Null,
    Bool,
    Int,
    Float,
    /// The empty string.
    EmptyText,
    /// Any non-empty string.
    Text,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::EmptyText => "empty_text",
            Self::Text => "text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text | Self::EmptyText)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify one value.
pub fn classify(value: &Value) -> Shape {
    match value {
        Value::Null => Shape::Null,
        Value::Bool(_) => Shape::Bool,
        Value::Int64(_) => Shape::Int,
        Value::Float64(_) => Shape::Float,
        Value::Utf8(s) if s.is_empty() => Shape::EmptyText,
        Value::Utf8(_) => Shape::Text,
    }
}

/// Observed shapes per column, in first-seen column order.
pub type ColumnShapes = IndexMap<String, BTreeSet<Shape>>;

/// Scan every row of a table and collect the shapes seen in each column.
///
/// A column missing from a row contributes nothing for that row.
pub fn analyze_table(table: &Table) -> ColumnShapes {
    let mut shapes = ColumnShapes::new();
    for row in &table.rows {
        for (column, value) in row {
            shapes
                .entry(column.clone())
                .or_default()
                .insert(classify(value));
        }
    }
    shapes
}

/// Whether a column's shapes indicate a problematic mix.
///
/// Nulls are ignored. Numeric mixed with any text is flagged, as is `int` mixed with `float`.
/// Non-empty text mixed only with empty text is normal and not flagged.
pub fn is_mixed(shapes: &BTreeSet<Shape>) -> bool {
    let non_null: BTreeSet<Shape> = shapes.iter().copied().filter(|s| *s != Shape::Null).collect();
    if non_null.len() <= 1 {
        return false;
    }

    let has_numeric = non_null.iter().any(Shape::is_numeric);
    let has_text = non_null.iter().any(Shape::is_text);
    if has_numeric && has_text {
        return true;
    }

    if non_null.contains(&Shape::Int) && non_null.contains(&Shape::Float) {
        return true;
    }

    if non_null.contains(&Shape::EmptyText) && non_null.contains(&Shape::Text) {
        return non_null.len() > 2;
    }

    false
}

/// Whether a column holds numbers (ignoring nulls).
pub fn is_numeric_column(shapes: &BTreeSet<Shape>) -> bool {
    shapes.iter().any(Shape::is_numeric)
}

/// Render a shape set as a sorted, comma-separated label (`empty_text, int`).
pub fn shapes_label(shapes: &BTreeSet<Shape>) -> String {
    let mut names: Vec<&str> = shapes.iter().map(Shape::as_str).collect();
    names.sort_unstable();
    names.join(", ")
}

/// A column flagged by [`is_mixed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedColumn {
    pub column: String,
    pub shapes: BTreeSet<Shape>,
}

/// Mixed columns of a single table.
pub fn mixed_columns(table: &Table) -> Vec<MixedColumn> {
    analyze_table(table)
        .into_iter()
        .filter(|(_, shapes)| is_mixed(shapes))
        .map(|(column, shapes)| MixedColumn { column, shapes })
        .collect()
}

/// Mixed columns across a dataset, grouped by table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedColumnReport {
    pub dataset: String,
    /// Only tables with at least one mixed column appear.
    pub tables: IndexMap<String, Vec<MixedColumn>>,
}

impl MixedColumnReport {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Number of flagged columns per shape combination, e.g. `"empty_text, int" -> 4`.
    pub fn type_combinations(&self) -> BTreeMap<String, usize> {
        let mut out = BTreeMap::new();
        for column in self.tables.values().flatten() {
            *out.entry(shapes_label(&column.shapes)).or_insert(0) += 1;
        }
        out
    }
}

impl fmt::Display for MixedColumnReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset: {}", self.dataset)?;
        if self.is_empty() {
            return writeln!(f, "  no mixed type columns");
        }
        for (table, columns) in &self.tables {
            writeln!(f, "  Table: {table}")?;
            for c in columns {
                writeln!(f, "    - {}: {}", c.column, shapes_label(&c.shapes))?;
            }
        }
        Ok(())
    }
}

/// Find mixed columns in every table of a dataset.
pub fn analyze_dataset(dataset: &Dataset) -> MixedColumnReport {
    let mut tables = IndexMap::new();
    for table in dataset.tables.values() {
        let mixed = mixed_columns(table);
        if !mixed.is_empty() {
            tables.insert(table.name.clone(), mixed);
        }
    }
    MixedColumnReport {
        dataset: dataset.name.clone(),
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;

    fn set(shapes: &[Shape]) -> BTreeSet<Shape> {
        shapes.iter().copied().collect()
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn classification_is_total() {
        let cases = [
            (Value::Null, Shape::Null),
            (Value::Bool(false), Shape::Bool),
            (Value::Int64(-3), Shape::Int),
            (Value::Float64(0.5), Shape::Float),
            (Value::Utf8(String::new()), Shape::EmptyText),
            (Value::Utf8("x".to_string()), Shape::Text),
        ];
        for (value, expected) in cases {
            assert_eq!(classify(&value), expected, "value {value:?}");
        }
    }

    #[test]
    fn numeric_with_empty_text_is_mixed() {
        assert!(is_mixed(&set(&[Shape::Int, Shape::EmptyText])));
        assert!(is_mixed(&set(&[Shape::Float, Shape::Text, Shape::Null])));
    }

    #[test]
    fn int_and_float_is_mixed() {
        assert!(is_mixed(&set(&[Shape::Int, Shape::Float])));
    }

    #[test]
    fn text_and_empty_text_alone_is_benign() {
        assert!(!is_mixed(&set(&[Shape::Text, Shape::EmptyText])));
        assert!(!is_mixed(&set(&[Shape::Text, Shape::EmptyText, Shape::Null])));
        assert!(is_mixed(&set(&[Shape::Text, Shape::EmptyText, Shape::Bool])));
    }

    #[test]
    fn single_shape_and_nulls_are_not_mixed() {
        assert!(!is_mixed(&set(&[])));
        assert!(!is_mixed(&set(&[Shape::Null])));
        assert!(!is_mixed(&set(&[Shape::Int, Shape::Null])));
        assert!(!is_mixed(&set(&[Shape::Bool, Shape::Text])));
    }

    #[test]
    fn absent_columns_contribute_nothing() {
        let table = Table::new(
            "t",
            vec![
                row(&[("a", Value::Int64(1))]),
                row(&[("a", Value::Int64(2)), ("b", Value::Utf8("x".to_string()))]),
            ],
        );
        let shapes = analyze_table(&table);
        assert_eq!(shapes["a"], set(&[Shape::Int]));
        assert_eq!(shapes["b"], set(&[Shape::Text]));
    }

    #[test]
    fn dataset_report_groups_by_table_and_counts_combinations() {
        let ds = Dataset::new("shop", "shop.json")
            .with_table(Table::new(
                "orders",
                vec![
                    row(&[("amount", Value::Utf8(String::new())), ("qty", Value::Int64(1))]),
                    row(&[("amount", Value::Int64(5)), ("qty", Value::Float64(1.5))]),
                ],
            ))
            .with_table(Table::new(
                "clean",
                vec![row(&[("name", Value::Utf8("a".to_string()))])],
            ));

        let report = analyze_dataset(&ds);
        assert_eq!(report.column_count(), 2);
        assert!(!report.tables.contains_key("clean"));
        let combos = report.type_combinations();
        assert_eq!(combos["empty_text, int"], 1);
        assert_eq!(combos["float, int"], 1);
        assert!(report.to_string().contains("- amount: empty_text, int"));
    }
}
