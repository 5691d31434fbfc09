//! Document key derivation.

use crate::config::LoaderConfig;
use crate::types::Row;

/// Column checked before any alternate key field.
pub const ID_FIELD: &str = "id";

/// Derives a document key for each row of a table.
///
/// Precedence: the row's `id` field, then the first configured alternate key field present in
/// the row, then the row's 1-based position. Positional keys are only stable if the source
/// keeps its row order between exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    alternate_fields: Vec<String>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(LoaderConfig::default().alternate_key_fields)
    }
}

impl KeyDeriver {
    pub fn new(alternate_fields: Vec<String>) -> Self {
        Self { alternate_fields }
    }

    /// Key for the row at 1-based `index` of a table whose keys start with `prefix`.
    pub fn derive(&self, prefix: &str, row: &Row, index: usize) -> String {
        let natural = row.get(ID_FIELD).or_else(|| {
            self.alternate_fields
                .iter()
                .find_map(|field| row.get(field.as_str()))
        });
        match natural {
            Some(value) => format!("{prefix}_{value}"),
            None => format!("{prefix}_{index}"),
        }
    }
}
