//! Document store clients.
//!
//! The pipeline talks to the store only through [`DocumentStore`]. Two implementations ship with
//! the crate:
//!
//! - [`HttpStore`]: a Couchbase-compatible cluster, via its query service and management REST API
//! - [`MemoryStore`]: an in-process store with failure injection, for tests and dry runs

pub mod http;
pub mod memory;

use crate::config::ContainerSettings;
use crate::error::StoreResult;
use crate::types::{Document, NamespacePath};

pub use http::HttpStore;
pub use memory::MemoryStore;

/// A sub-container and the leaf containers it holds, as reported by metadata listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubContainerInfo {
    pub name: String,
    pub leaves: Vec<String>,
}

impl SubContainerInfo {
    pub fn has_leaf(&self, leaf: &str) -> bool {
        self.leaves.iter().any(|l| l == leaf)
    }
}

/// Operations the import pipeline needs from a bucket/scope/collection style store.
///
/// Implementations must classify failures into [`crate::StoreError`] variants; in particular a
/// create call for something that already exists must return `StoreError::AlreadyExists`.
pub trait DocumentStore: Send + Sync {
    /// Names of all containers.
    fn list_containers(&self) -> StoreResult<Vec<String>>;

    /// Create a container through the management API.
    fn create_container(&self, name: &str, settings: &ContainerSettings) -> StoreResult<()>;

    /// Sub-containers (with their leaves) of a container.
    fn list_sub_containers(&self, container: &str) -> StoreResult<Vec<SubContainerInfo>>;

    /// Run a declarative statement (e.g. `CREATE SCOPE ... IF NOT EXISTS`).
    fn execute_statement(&self, statement: &str) -> StoreResult<()>;

    /// Create a sub-container through the management API.
    fn create_sub_container(&self, container: &str, sub_container: &str) -> StoreResult<()>;

    /// Create a leaf container through the management API.
    fn create_leaf(&self, container: &str, sub_container: &str, leaf: &str) -> StoreResult<()>;

    /// Insert or overwrite a document.
    fn upsert(&self, path: &NamespacePath, document: &Document) -> StoreResult<()>;
}

/// Quote a name for use in a statement: `` `name` ``.
///
/// Names containing a backtick cannot be quoted safely and yield `None`.
pub fn quote_identifier(name: &str) -> Option<String> {
    if name.is_empty() || name.contains('`') {
        None
    } else {
        Some(format!("`{name}`"))
    }
}
