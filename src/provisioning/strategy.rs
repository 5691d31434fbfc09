//! Ways of creating a namespace level, tried in order by the provisioner.

use std::fmt;

use crate::config::ContainerSettings;
use crate::error::{StoreError, StoreResult};
use crate::store::{DocumentStore, quote_identifier};
use crate::types::NamespacePath;

/// One level of a [`NamespacePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceLevel {
    Container,
    SubContainer,
    Leaf,
}

impl fmt::Display for NamespaceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Container => "container",
            Self::SubContainer => "sub-container",
            Self::Leaf => "leaf container",
        })
    }
}

/// A mechanism for creating namespace levels.
///
/// `create` may return `StoreError::AlreadyExists`; the provisioner treats that as success.
pub trait CreationStrategy: Send + Sync {
    /// Short name used in logs and outcomes.
    fn name(&self) -> &'static str;

    /// Whether this strategy can create `level` at all.
    fn supports(&self, level: NamespaceLevel) -> bool;

    /// Create `level` of `path`. Levels above it already exist.
    fn create(
        &self,
        store: &dyn DocumentStore,
        path: &NamespacePath,
        level: NamespaceLevel,
        settings: &ContainerSettings,
    ) -> StoreResult<()>;
}

/// Primary strategy: `CREATE ... IF NOT EXISTS` statements through the query service.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatementStrategy;

impl CreationStrategy for StatementStrategy {
    fn name(&self) -> &'static str {
        "statement"
    }

    fn supports(&self, level: NamespaceLevel) -> bool {
        matches!(level, NamespaceLevel::SubContainer | NamespaceLevel::Leaf)
    }

    fn create(
        &self,
        store: &dyn DocumentStore,
        path: &NamespacePath,
        level: NamespaceLevel,
        _settings: &ContainerSettings,
    ) -> StoreResult<()> {
        let statement = match level {
            NamespaceLevel::SubContainer => create_scope_statement(path)?,
            NamespaceLevel::Leaf => create_collection_statement(path)?,
            NamespaceLevel::Container => {
                return Err(StoreError::Structural(
                    "containers cannot be created by statement".to_string(),
                ));
            }
        };
        store.execute_statement(&statement)
    }
}

/// Fallback strategy: the store's structural management API.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManagementStrategy;

impl CreationStrategy for ManagementStrategy {
    fn name(&self) -> &'static str {
        "management"
    }

    fn supports(&self, _level: NamespaceLevel) -> bool {
        true
    }

    fn create(
        &self,
        store: &dyn DocumentStore,
        path: &NamespacePath,
        level: NamespaceLevel,
        settings: &ContainerSettings,
    ) -> StoreResult<()> {
        match level {
            NamespaceLevel::Container => store.create_container(&path.container, settings),
            NamespaceLevel::SubContainer => {
                store.create_sub_container(&path.container, &path.sub_container)
            }
            NamespaceLevel::Leaf => store.create_leaf(&path.container, &path.sub_container, &path.leaf),
        }
    }
}

/// Statement first, management API second.
pub fn default_strategies() -> Vec<Box<dyn CreationStrategy>> {
    vec![Box::new(StatementStrategy), Box::new(ManagementStrategy)]
}

fn quoted(name: &str) -> StoreResult<String> {
    quote_identifier(name).ok_or_else(|| StoreError::Structural(format!("cannot quote name '{name}'")))
}

/// `CREATE SCOPE `container`.`sub` IF NOT EXISTS`
pub fn create_scope_statement(path: &NamespacePath) -> StoreResult<String> {
    Ok(format!(
        "CREATE SCOPE {}.{} IF NOT EXISTS",
        quoted(&path.container)?,
        quoted(&path.sub_container)?
    ))
}

/// `CREATE COLLECTION `container`.`sub`.`leaf` IF NOT EXISTS`
pub fn create_collection_statement(path: &NamespacePath) -> StoreResult<String> {
    Ok(format!(
        "CREATE COLLECTION {}.{}.{} IF NOT EXISTS",
        quoted(&path.container)?,
        quoted(&path.sub_container)?,
        quoted(&path.leaf)?
    ))
}
