//! Core data model types for import.
//!
//! A [`Dataset`] is one logical database read from one import file. It owns ordered [`Table`]s,
//! each holding [`Row`]s of scalar [`Value`]s. Rows are written to the store as [`Document`]s
//! under a [`NamespacePath`].

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

use crate::error::{ImportError, ImportResult};

/// Name of the sub-container and leaf container that every container always has.
pub const DEFAULT_NAMESPACE: &str = "_default";

/// A single scalar value in a [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/null value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string (possibly empty).
    Utf8(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for an empty [`Value::Utf8`].
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Self::Utf8(s) if s.is_empty())
    }

    /// Convert a JSON value into a scalar.
    ///
    /// Arrays and objects are not scalars and are rejected.
    pub fn from_json(v: &serde_json::Value) -> ImportResult<Self> {
        match v {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::String(s) => Ok(Self::Utf8(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int64(i))
                } else if n.is_u64() {
                    Err(ImportError::structural(format!(
                        "integer {n} is out of range for i64"
                    )))
                } else {
                    n.as_f64()
                        .map(Self::Float64)
                        .ok_or_else(|| ImportError::structural(format!("unsupported number {n}")))
                }
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(
                ImportError::structural(format!("expected a scalar value, found {v}")),
            ),
        }
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int64(i) => serde_json::Value::from(*i),
            // Non-finite floats have no JSON form.
            Self::Float64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Utf8(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Float64(x) => write!(f, "{x:?}"),
            Self::Utf8(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int64(i) => serializer.serialize_i64(*i),
            Self::Float64(f) => serializer.serialize_f64(*f),
            Self::Utf8(s) => serializer.serialize_str(s),
        }
    }
}

/// One row: column name to value, in source order.
///
/// Rows within a table need not share the same columns.
pub type Row = IndexMap<String, Value>;

/// How a table was laid out in its source file.
///
/// Kept so a cleaned dataset can be written back in the shape it was read.
#[derive(Debug, Clone, PartialEq)]
pub enum TableLayout {
    /// `{"table": [rows]}`
    Rows,
    /// `{"table": {"data": [rows], "row_count": N, ...}}`; `metadata` holds every key except `data`.
    Wrapped {
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    /// The whole file is a top-level array of documents.
    Documents,
}

/// A named, ordered sequence of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name (also the leaf container name).
    pub name: String,
    /// Rows in source order.
    pub rows: Vec<Row>,
    /// Source layout.
    pub layout: TableLayout,
}

impl Table {
    /// Create a table read from the plain `{"table": [rows]}` layout.
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
            layout: TableLayout::Rows,
        }
    }

    /// Number of rows in the table.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Prefix used when deriving document keys for this table's rows.
    pub fn key_prefix(&self) -> &str {
        match self.layout {
            TableLayout::Documents => "doc",
            _ => &self.name,
        }
    }
}

/// A table entry that was not imported because its shape was not recognized.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTable {
    /// Table name as declared in the file.
    pub name: String,
    /// Why the entry was skipped.
    pub reason: String,
    /// The raw entry, preserved so rewriting the file does not drop it.
    pub raw: serde_json::Value,
}

/// One logical database: an ordered set of tables read from one import unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Dataset name (the import file's stem); becomes the container name.
    pub name: String,
    /// Origin source identifier written into every document (the import file name).
    pub source: String,
    /// Tables in declaration order.
    pub tables: IndexMap<String, Table>,
    /// Entries that could not be read as tables.
    pub skipped: Vec<SkippedTable>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            tables: IndexMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Add (or replace) a table, keeping declaration order.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Iterate table names in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.values().map(Table::row_count).sum()
    }
}

/// Three-level destination address: container / sub-container / leaf container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacePath {
    pub container: String,
    pub sub_container: String,
    pub leaf: String,
}

impl NamespacePath {
    pub fn new(
        container: impl Into<String>,
        sub_container: impl Into<String>,
        leaf: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            sub_container: sub_container.into(),
            leaf: leaf.into(),
        }
    }

    /// `true` when the sub-container is the always-present default.
    pub fn has_default_sub_container(&self) -> bool {
        self.sub_container == DEFAULT_NAMESPACE
    }

    /// `true` when both the sub-container and leaf are the always-present defaults.
    pub fn is_default_leaf(&self) -> bool {
        self.has_default_sub_container() && self.leaf == DEFAULT_NAMESPACE
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.container, self.sub_container, self.leaf)
    }
}

/// Field holding the origin table name in every document.
pub const TABLE_FIELD: &str = "_table";
/// Field holding the origin source identifier in every document.
pub const SOURCE_FIELD: &str = "_source";

/// The stored representation of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Derived document key.
    pub key: String,
    /// Row fields plus [`TABLE_FIELD`] and [`SOURCE_FIELD`].
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Build a document from a row. The system fields overwrite same-named row fields.
    pub fn from_row(key: impl Into<String>, row: &Row, table: &str, source: &str) -> Self {
        let mut body = serde_json::Map::with_capacity(row.len() + 2);
        for (column, value) in row {
            body.insert(column.clone(), value.to_json());
        }
        body.insert(TABLE_FIELD.to_string(), serde_json::Value::from(table));
        body.insert(SOURCE_FIELD.to_string(), serde_json::Value::from(source));
        Self {
            key: key.into(),
            body,
        }
    }

    /// Look up a body field.
    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.body.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_from_json_scalars() {
        assert_eq!(Value::from_json(&serde_json::json!(null)).unwrap(), Value::Null);
        assert_eq!(Value::from_json(&serde_json::json!(7)).unwrap(), Value::Int64(7));
        assert_eq!(Value::from_json(&serde_json::json!(2.5)).unwrap(), Value::Float64(2.5));
        assert_eq!(
            Value::from_json(&serde_json::json!("")).unwrap(),
            Value::Utf8(String::new())
        );
        assert_eq!(Value::from_json(&serde_json::json!(true)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn value_from_json_rejects_nested() {
        let err = Value::from_json(&serde_json::json!({"a": 1})).unwrap_err();
        assert!(err.to_string().contains("expected a scalar value"));
        assert!(Value::from_json(&serde_json::json!([1, 2])).is_err());
        assert!(Value::from_json(&serde_json::json!(u64::MAX)).is_err());
    }

    #[test]
    fn float_display_keeps_fraction() {
        assert_eq!(Value::Float64(7.0).to_string(), "7.0");
        assert_eq!(Value::Int64(7).to_string(), "7");
    }

    #[test]
    fn document_system_fields_override_row() {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::Int64(1));
        row.insert("_table".to_string(), Value::Utf8("spoofed".to_string()));
        let doc = Document::from_row("t_1", &row, "t", "t.json");
        assert_eq!(doc.get("_table"), Some(&serde_json::json!("t")));
        assert_eq!(doc.get("_source"), Some(&serde_json::json!("t.json")));
        assert_eq!(doc.get("id"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn namespace_path_display_is_dotted() {
        let path = NamespacePath::new("db", "spider2", "orders");
        assert_eq!(path.to_string(), "db.spider2.orders");
        assert!(!path.has_default_sub_container());
        assert!(NamespacePath::new("db", "_default", "_default").is_default_leaf());
    }
}
