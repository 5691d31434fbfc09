//! In-process [`DocumentStore`].
//!
//! Understands the two declarative statements the provisioner issues
//! (`CREATE SCOPE ... IF NOT EXISTS` and `CREATE COLLECTION ... IF NOT EXISTS`) and supports
//! injecting failures per operation, so provisioning fallbacks and partial failures can be
//! exercised without a cluster.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;

use crate::config::ContainerSettings;
use crate::error::{StoreError, StoreResult};
use crate::types::{DEFAULT_NAMESPACE, Document, NamespacePath};

use super::{DocumentStore, SubContainerInfo};

type Leaf = BTreeMap<String, serde_json::Map<String, serde_json::Value>>;
type SubContainer = BTreeMap<String, Leaf>;
type Container = BTreeMap<String, SubContainer>;

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, Container>,
    statements: Vec<String>,
    creations: usize,
    // failure injection
    statements_disabled: bool,
    failing_leaves: HashSet<String>,
    failing_keys: HashSet<String>,
    transient_budget: usize,
    stale_listing: bool,
}

impl State {
    fn take_transient(&mut self) -> StoreResult<()> {
        if self.transient_budget > 0 {
            self.transient_budget -= 1;
            return Err(StoreError::Transient("injected timeout".to_string()));
        }
        Ok(())
    }

    fn add_container(&mut self, name: &str) -> StoreResult<()> {
        if self.containers.contains_key(name) {
            return Err(StoreError::AlreadyExists(format!("container '{name}'")));
        }
        self.creations += 1;
        let mut default_sub = SubContainer::new();
        default_sub.insert(DEFAULT_NAMESPACE.to_string(), Leaf::new());
        let mut container = Container::new();
        container.insert(DEFAULT_NAMESPACE.to_string(), default_sub);
        self.containers.insert(name.to_string(), container);
        Ok(())
    }

    fn add_sub_container(&mut self, container: &str, sub: &str) -> StoreResult<()> {
        let c = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::NotFound(format!("container '{container}'")))?;
        if c.contains_key(sub) {
            return Err(StoreError::AlreadyExists(format!("scope '{container}.{sub}'")));
        }
        self.creations += 1;
        c.insert(sub.to_string(), SubContainer::new());
        Ok(())
    }

    fn add_leaf(&mut self, container: &str, sub: &str, leaf: &str) -> StoreResult<()> {
        if self.failing_leaves.contains(leaf) {
            return Err(StoreError::Structural(format!(
                "injected failure creating '{container}.{sub}.{leaf}'"
            )));
        }
        let s = self
            .containers
            .get_mut(container)
            .and_then(|c| c.get_mut(sub))
            .ok_or_else(|| StoreError::NotFound(format!("scope '{container}.{sub}'")))?;
        if s.contains_key(leaf) {
            return Err(StoreError::AlreadyExists(format!(
                "collection '{container}.{sub}.{leaf}'"
            )));
        }
        self.creations += 1;
        s.insert(leaf.to_string(), Leaf::new());
        Ok(())
    }

    fn leaf_mut(&mut self, path: &NamespacePath) -> StoreResult<&mut Leaf> {
        self.containers
            .get_mut(&path.container)
            .and_then(|c| c.get_mut(&path.sub_container))
            .and_then(|s| s.get_mut(&path.leaf))
            .ok_or_else(|| StoreError::NotFound(format!("keyspace '{path}'")))
    }
}

/// A [`DocumentStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Fatal("memory store mutex poisoned".to_string()))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Make every declarative statement fail, forcing the management-API fallback.
    pub fn disable_statements(&self) {
        self.with_state(|s| s.statements_disabled = true);
    }

    /// Make every attempt to create a leaf container with this name fail.
    pub fn fail_leaf(&self, leaf: impl Into<String>) {
        self.with_state(|s| {
            s.failing_leaves.insert(leaf.into());
        });
    }

    /// Make upserts of this document key fail.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.with_state(|s| {
            s.failing_keys.insert(key.into());
        });
    }

    /// Fail the next `n` store calls with a transient error.
    pub fn fail_transiently(&self, n: usize) {
        self.with_state(|s| s.transient_budget = n);
    }

    /// Report no sub-containers from metadata listing, as a lagging or racing cluster might.
    pub fn serve_stale_listing(&self, stale: bool) {
        self.with_state(|s| s.stale_listing = stale);
    }

    /// Number of successful creations at any namespace level.
    pub fn creation_count(&self) -> usize {
        self.with_state(|s| s.creations)
    }

    /// Every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.with_state(|s| s.statements.clone())
    }

    /// Whether a namespace path exists.
    pub fn has_path(&self, path: &NamespacePath) -> bool {
        self.with_state(|s| s.leaf_mut(path).is_ok())
    }

    /// Sorted names of every existing `container.sub.leaf`.
    pub fn keyspaces(&self) -> BTreeSet<String> {
        self.with_state(|s| {
            let mut out = BTreeSet::new();
            for (c, subs) in &s.containers {
                for (sub, leaves) in subs {
                    for leaf in leaves.keys() {
                        out.insert(format!("{c}.{sub}.{leaf}"));
                    }
                }
            }
            out
        })
    }

    /// A stored document body.
    pub fn document(
        &self,
        path: &NamespacePath,
        key: &str,
    ) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.with_state(|s| s.leaf_mut(path).ok().and_then(|l| l.get(key).cloned()))
    }

    /// Number of documents in a leaf container.
    pub fn document_count(&self, path: &NamespacePath) -> usize {
        self.with_state(|s| s.leaf_mut(path).map(|l| l.len()).unwrap_or(0))
    }
}

impl DocumentStore for MemoryStore {
    fn list_containers(&self) -> StoreResult<Vec<String>> {
        let mut state = self.lock()?;
        state.take_transient()?;
        Ok(state.containers.keys().cloned().collect())
    }

    fn create_container(&self, name: &str, _settings: &ContainerSettings) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_transient()?;
        state.add_container(name)
    }

    fn list_sub_containers(&self, container: &str) -> StoreResult<Vec<SubContainerInfo>> {
        let mut state = self.lock()?;
        state.take_transient()?;
        let subs = state
            .containers
            .get(container)
            .ok_or_else(|| StoreError::NotFound(format!("container '{container}'")))?;
        if state.stale_listing {
            return Ok(Vec::new());
        }
        Ok(subs
            .iter()
            .map(|(name, leaves)| SubContainerInfo {
                name: name.clone(),
                leaves: leaves.keys().cloned().collect(),
            })
            .collect())
    }

    fn execute_statement(&self, statement: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_transient()?;
        state.statements.push(statement.to_string());
        if state.statements_disabled {
            return Err(StoreError::Structural("query service unavailable".to_string()));
        }

        match parse_create_statement(statement)? {
            Create::Scope { container, sub } => {
                ignore_existing(state.add_sub_container(&container, &sub))
            }
            Create::Collection {
                container,
                sub,
                leaf,
            } => ignore_existing(state.add_leaf(&container, &sub, &leaf)),
        }
    }

    fn create_sub_container(&self, container: &str, sub_container: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_transient()?;
        state.add_sub_container(container, sub_container)
    }

    fn create_leaf(&self, container: &str, sub_container: &str, leaf: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_transient()?;
        state.add_leaf(container, sub_container, leaf)
    }

    fn upsert(&self, path: &NamespacePath, document: &Document) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.take_transient()?;
        if state.failing_keys.contains(&document.key) {
            return Err(StoreError::Structural(format!(
                "injected failure writing '{}'",
                document.key
            )));
        }
        let leaf = state.leaf_mut(path)?;
        leaf.insert(document.key.clone(), document.body.clone());
        Ok(())
    }
}

// `IF NOT EXISTS` statements succeed silently when the target exists.
fn ignore_existing(result: StoreResult<()>) -> StoreResult<()> {
    match result {
        Err(StoreError::AlreadyExists(_)) => Ok(()),
        other => other,
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Create {
    Scope {
        container: String,
        sub: String,
    },
    Collection {
        container: String,
        sub: String,
        leaf: String,
    },
}

fn parse_create_statement(statement: &str) -> StoreResult<Create> {
    let unsupported = || StoreError::Structural(format!("unsupported statement: {statement}"));

    let rest = statement.trim();
    let rest = rest.strip_suffix("IF NOT EXISTS").ok_or_else(unsupported)?.trim();
    let (kind, target) = rest
        .strip_prefix("CREATE SCOPE ")
        .map(|t| ("scope", t))
        .or_else(|| rest.strip_prefix("CREATE COLLECTION ").map(|t| ("collection", t)))
        .ok_or_else(unsupported)?;

    let parts: Vec<String> = target
        .trim()
        .split('.')
        .map(|p| p.trim().trim_matches('`').to_string())
        .collect();

    match (kind, parts.as_slice()) {
        ("scope", [container, sub]) => Ok(Create::Scope {
            container: container.clone(),
            sub: sub.clone(),
        }),
        ("collection", [container, sub, leaf]) => Ok(Create::Collection {
            container: container.clone(),
            sub: sub.clone(),
            leaf: leaf.clone(),
        }),
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provisioning_statements() {
        assert_eq!(
            parse_create_statement("CREATE SCOPE `db`.`spider2` IF NOT EXISTS").unwrap(),
            Create::Scope {
                container: "db".to_string(),
                sub: "spider2".to_string(),
            }
        );
        assert_eq!(
            parse_create_statement("CREATE COLLECTION `db`.`spider2`.`t` IF NOT EXISTS").unwrap(),
            Create::Collection {
                container: "db".to_string(),
                sub: "spider2".to_string(),
                leaf: "t".to_string(),
            }
        );
        assert!(parse_create_statement("SELECT 1").is_err());
    }

    #[test]
    fn new_container_has_default_namespace() {
        let store = MemoryStore::new();
        store
            .create_container("db", &ContainerSettings::default())
            .unwrap();
        assert!(store.has_path(&NamespacePath::new("db", "_default", "_default")));
        assert!(matches!(
            store.create_container("db", &ContainerSettings::default()),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn if_not_exists_statement_is_silent_on_existing() {
        let store = MemoryStore::new();
        store
            .create_container("db", &ContainerSettings::default())
            .unwrap();
        store
            .execute_statement("CREATE SCOPE `db`.`s` IF NOT EXISTS")
            .unwrap();
        store
            .execute_statement("CREATE SCOPE `db`.`s` IF NOT EXISTS")
            .unwrap();
        assert!(matches!(
            store.create_sub_container("db", "s"),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn upsert_requires_existing_leaf() {
        let store = MemoryStore::new();
        let doc = Document {
            key: "k".to_string(),
            body: serde_json::Map::new(),
        };
        let err = store
            .upsert(&NamespacePath::new("db", "s", "t"), &doc)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn transient_budget_is_consumed() {
        let store = MemoryStore::new();
        store.fail_transiently(1);
        assert!(store.list_containers().unwrap_err().is_transient());
        assert!(store.list_containers().unwrap().is_empty());
    }
}
