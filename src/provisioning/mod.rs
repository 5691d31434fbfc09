//! Idempotent creation of container / sub-container / leaf namespaces.
//!
//! [`NamespaceProvisioner::ensure`] walks the three levels of a [`NamespacePath`] top-down. For
//! each level it:
//!
//! 1. skips levels that always exist (`_default`)
//! 2. checks current metadata and stops if the level is present
//! 3. otherwise tries each [`CreationStrategy`] in order until one succeeds
//!
//! `StoreError::AlreadyExists` from a strategy counts as success, so concurrent or repeated
//! calls converge on the same end state. Transient failures are retried per
//! [`RetryPolicy`] before a strategy is given up on.

pub mod strategy;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{ContainerSettings, ImportConfig, RetryPolicy, SettleDelays};
use crate::error::{ImportError, ImportResult, StoreError, StoreResult};
use crate::store::DocumentStore;
use crate::types::{DEFAULT_NAMESPACE, NamespacePath};

pub use strategy::{
    CreationStrategy, ManagementStrategy, NamespaceLevel, StatementStrategy, default_strategies,
};

/// What happened to one namespace level during [`NamespaceProvisioner::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOutcome {
    /// The level is an always-present default.
    Default,
    /// Metadata showed the level already present.
    Existed,
    /// The named strategy created it.
    Created { strategy: &'static str },
    /// Not visible in metadata, but the store reported it as already existing on create.
    CreatedConcurrently { strategy: &'static str },
}

impl LevelOutcome {
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Per-level result of a successful [`NamespaceProvisioner::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOutcome {
    pub container: LevelOutcome,
    pub sub_container: LevelOutcome,
    pub leaf: LevelOutcome,
}

impl EnsureOutcome {
    /// `true` if this call created at least one level.
    pub fn created_any(&self) -> bool {
        self.container.was_created() || self.sub_container.was_created() || self.leaf.was_created()
    }
}

/// Ensures namespace paths exist before documents are written to them.
pub struct NamespaceProvisioner {
    store: Arc<dyn DocumentStore>,
    strategies: Vec<Box<dyn CreationStrategy>>,
    container_settings: ContainerSettings,
    retry: RetryPolicy,
    settle: SettleDelays,
}

impl std::fmt::Debug for NamespaceProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceProvisioner")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("container_settings", &self.container_settings)
            .field("retry", &self.retry)
            .field("settle", &self.settle)
            .finish()
    }
}

impl NamespaceProvisioner {
    /// Create a provisioner using [`default_strategies`].
    pub fn new(store: Arc<dyn DocumentStore>, config: &ImportConfig) -> Self {
        Self {
            store,
            strategies: default_strategies(),
            container_settings: config.namespace.container.clone(),
            retry: config.retry.clone(),
            settle: config.settle.clone(),
        }
    }

    /// Replace the ordered strategy list.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn CreationStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Make sure every level of `path` exists.
    ///
    /// Calling this any number of times leaves the store in the same state as calling it once.
    pub fn ensure(&self, path: &NamespacePath) -> ImportResult<EnsureOutcome> {
        let container = self.ensure_container(path)?;
        let sub_container = self.ensure_sub_container(path)?;
        let leaf = self.ensure_leaf(path)?;
        Ok(EnsureOutcome {
            container,
            sub_container,
            leaf,
        })
    }

    /// Ensure only the container and sub-container of `path`.
    ///
    /// Used to create the levels shared by a dataset's tables once, before the tables fan out.
    pub fn ensure_parents(&self, path: &NamespacePath) -> ImportResult<(LevelOutcome, LevelOutcome)> {
        Ok((self.ensure_container(path)?, self.ensure_sub_container(path)?))
    }

    fn ensure_container(&self, path: &NamespacePath) -> ImportResult<LevelOutcome> {
        let exists = self.check(|| {
            Ok(self
                .store
                .list_containers()?
                .iter()
                .any(|c| *c == path.container))
        });
        if exists {
            return Ok(LevelOutcome::Existed);
        }
        self.create(path, NamespaceLevel::Container, self.settle.container_ms)
    }

    fn ensure_sub_container(&self, path: &NamespacePath) -> ImportResult<LevelOutcome> {
        if path.has_default_sub_container() {
            return Ok(LevelOutcome::Default);
        }
        let exists = self.check(|| {
            Ok(self
                .store
                .list_sub_containers(&path.container)?
                .iter()
                .any(|s| s.name == path.sub_container))
        });
        if exists {
            return Ok(LevelOutcome::Existed);
        }
        self.create(path, NamespaceLevel::SubContainer, self.settle.sub_container_ms)
    }

    fn ensure_leaf(&self, path: &NamespacePath) -> ImportResult<LevelOutcome> {
        if path.is_default_leaf() {
            return Ok(LevelOutcome::Default);
        }
        let exists = self.check(|| {
            Ok(self
                .store
                .list_sub_containers(&path.container)?
                .iter()
                .any(|s| s.name == path.sub_container && s.has_leaf(&path.leaf)))
        });
        if exists {
            return Ok(LevelOutcome::Existed);
        }
        self.create(path, NamespaceLevel::Leaf, self.settle.leaf_ms)
    }

    // A failed existence check is not fatal: creation is attempted and tolerates existing targets.
    fn check(&self, lookup: impl FnMut() -> StoreResult<bool>) -> bool {
        match self.retry.run(lookup) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(error = %e, "existence check failed; attempting creation");
                false
            }
        }
    }

    fn create(
        &self,
        path: &NamespacePath,
        level: NamespaceLevel,
        settle_ms: u64,
    ) -> ImportResult<LevelOutcome> {
        let mut attempts = 0;
        let mut last_error = None;

        for strategy in self.strategies.iter().filter(|s| s.supports(level)) {
            attempts += 1;
            let result = self.retry.run(|| {
                strategy.create(self.store.as_ref(), path, level, &self.container_settings)
            });
            match result {
                Ok(()) => {
                    tracing::debug!(%path, %level, strategy = strategy.name(), "created");
                    if settle_ms > 0 {
                        thread::sleep(Duration::from_millis(settle_ms));
                    }
                    return Ok(LevelOutcome::Created {
                        strategy: strategy.name(),
                    });
                }
                Err(StoreError::AlreadyExists(_)) => {
                    return Ok(LevelOutcome::CreatedConcurrently {
                        strategy: strategy.name(),
                    });
                }
                Err(e) => {
                    tracing::warn!(%path, %level, strategy = strategy.name(), error = %e, "creation strategy failed");
                    last_error = Some(e);
                }
            }
        }

        Err(ImportError::Provisioning {
            path: path.clone(),
            attempts,
            last_error: last_error.unwrap_or_else(|| {
                StoreError::Structural(format!("no creation strategy supports the {level} level"))
            }),
        })
    }
}

/// The namespace a table is written to.
///
/// With separate leaf containers, `dataset.sub_container.table`. Shared mode and top-level
/// document arrays go to the container's always-present `_default._default`.
pub fn path_for_table(
    dataset: &str,
    table: &str,
    sub_container: &str,
    separate_leaf_containers: bool,
) -> NamespacePath {
    if separate_leaf_containers && table != DEFAULT_NAMESPACE {
        NamespacePath::new(dataset, sub_container, table)
    } else {
        NamespacePath::new(dataset, DEFAULT_NAMESPACE, DEFAULT_NAMESPACE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn provisioner(store: Arc<MemoryStore>) -> NamespaceProvisioner {
        NamespaceProvisioner::new(store, &ImportConfig::default().without_delays())
    }

    #[test]
    fn ensure_creates_all_levels_then_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let prov = provisioner(store.clone());
        let path = NamespacePath::new("db", "spider2", "orders");

        let first = prov.ensure(&path).unwrap();
        assert_eq!(first.container, LevelOutcome::Created { strategy: "management" });
        assert_eq!(first.sub_container, LevelOutcome::Created { strategy: "statement" });
        assert_eq!(first.leaf, LevelOutcome::Created { strategy: "statement" });
        let keyspaces = store.keyspaces();

        let second = prov.ensure(&path).unwrap();
        assert!(!second.created_any());
        assert_eq!(second.leaf, LevelOutcome::Existed);
        assert_eq!(store.keyspaces(), keyspaces);
        assert_eq!(store.creation_count(), 3);
    }

    #[test]
    fn falls_back_to_management_api() {
        let store = Arc::new(MemoryStore::new());
        store.disable_statements();
        let prov = provisioner(store.clone());
        let path = NamespacePath::new("db", "spider2", "orders");

        let out = prov.ensure(&path).unwrap();
        assert_eq!(out.leaf, LevelOutcome::Created { strategy: "management" });
        assert!(store.has_path(&path));
    }

    #[test]
    fn exhausted_strategies_fail_the_path() {
        let store = Arc::new(MemoryStore::new());
        store.fail_leaf("broken");
        let prov = provisioner(store.clone());

        let err = prov
            .ensure(&NamespacePath::new("db", "spider2", "broken"))
            .unwrap_err();
        match err {
            ImportError::Provisioning { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stale_metadata_converges_on_already_exists() {
        let store = Arc::new(MemoryStore::new());
        store.disable_statements();
        let prov = provisioner(store.clone());
        let path = NamespacePath::new("db", "spider2", "orders");
        prov.ensure(&path).unwrap();

        store.serve_stale_listing(true);
        let out = prov.ensure(&path).unwrap();
        assert_eq!(
            out.sub_container,
            LevelOutcome::CreatedConcurrently { strategy: "management" }
        );
        assert_eq!(
            out.leaf,
            LevelOutcome::CreatedConcurrently { strategy: "management" }
        );
    }

    #[test]
    fn default_levels_are_not_created() {
        let store = Arc::new(MemoryStore::new());
        let prov = provisioner(store.clone());
        let out = prov
            .ensure(&NamespacePath::new("db", "_default", "_default"))
            .unwrap();
        assert_eq!(out.sub_container, LevelOutcome::Default);
        assert_eq!(out.leaf, LevelOutcome::Default);
        assert_eq!(store.creation_count(), 1);
        assert!(store.statements().is_empty());
    }

    #[test]
    fn transient_failures_are_retried() {
        let store = Arc::new(MemoryStore::new());
        store.fail_transiently(2);
        let prov = provisioner(store.clone());
        let path = NamespacePath::new("db", "spider2", "orders");
        prov.ensure(&path).unwrap();
        assert!(store.has_path(&path));
    }

    #[test]
    fn table_paths_follow_leaf_mode() {
        assert_eq!(
            path_for_table("t_dataset", "t", "spider2", true).to_string(),
            "t_dataset.spider2.t"
        );
        assert_eq!(
            path_for_table("t_dataset", "t", "spider2", false).to_string(),
            "t_dataset._default._default"
        );
        assert_eq!(
            path_for_table("docs", "_default", "spider2", true).to_string(),
            "docs._default._default"
        );
    }
}
