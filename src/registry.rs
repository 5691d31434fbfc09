//! Keyspace addresses for downstream query-scope resolution.
//!
//! A [`KeyspaceRegistry`] lists the `container.sub_container.leaf` address of every table, built
//! from datasets before import, from a directory of dataset files, or from what a store already
//! holds. Addresses are derived with the same rules the importer writes with, so the listing
//! matches where documents actually land.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::config::NamespaceConfig;
use crate::error::{ImportError, ImportResult, StoreResult};
use crate::ingestion::{discover_dataset_files, read_dataset_from_path};
use crate::provisioning::path_for_table;
use crate::store::DocumentStore;
use crate::types::{Dataset, NamespacePath};

/// A fully-qualified `container.sub_container.leaf` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyspaceAddress(NamespacePath);

impl KeyspaceAddress {
    pub fn new(path: NamespacePath) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &NamespacePath {
        &self.0
    }

    pub fn container(&self) -> &str {
        &self.0.container
    }

    pub fn sub_container(&self) -> &str {
        &self.0.sub_container
    }

    pub fn leaf(&self) -> &str {
        &self.0.leaf
    }
}

impl From<NamespacePath> for KeyspaceAddress {
    fn from(path: NamespacePath) -> Self {
        Self(path)
    }
}

impl fmt::Display for KeyspaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for KeyspaceAddress {
    type Err = ImportError;

    /// Parse `container.sub_container.leaf`.
    ///
    /// Container names may contain dots; the last two segments are always the sub-container and
    /// leaf.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().rsplitn(3, '.');
        let leaf = parts.next().unwrap_or_default();
        let sub = parts.next().unwrap_or_default();
        let container = parts.next().unwrap_or_default();
        if [container, sub, leaf].iter().any(|p| p.is_empty()) {
            return Err(ImportError::structural(format!(
                "expected container.sub_container.leaf, got '{s}'"
            )));
        }
        Ok(Self(NamespacePath::new(container, sub, leaf)))
    }
}

/// Keyspace addresses grouped by dataset (container).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyspaceRegistry {
    /// Container name to its addresses, in table declaration order.
    by_dataset: BTreeMap<String, Vec<KeyspaceAddress>>,
}

impl KeyspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses of every recognized table of `datasets`.
    pub fn from_datasets(datasets: &[Dataset], namespace: &NamespaceConfig) -> Self {
        let mut out = Self::new();
        for ds in datasets {
            out.add_dataset(ds, namespace);
        }
        out
    }

    /// Addresses of every dataset file in `dir`.
    ///
    /// Files that cannot be read are logged and left out.
    pub fn from_directory(dir: impl AsRef<Path>, namespace: &NamespaceConfig) -> ImportResult<Self> {
        let mut out = Self::new();
        for file in discover_dataset_files(dir, false)? {
            match read_dataset_from_path(&file.path) {
                Ok(ds) => out.add_dataset(&ds, namespace),
                Err(e) => tracing::warn!(path = %file.path.display(), error = %e, "skipping unreadable dataset file"),
            }
        }
        Ok(out)
    }

    /// Addresses of every leaf under `sub_container` in every container of `store`.
    pub fn from_store(store: &dyn DocumentStore, sub_container: &str) -> StoreResult<Self> {
        let mut out = Self::new();
        for container in store.list_containers()? {
            for sub in store.list_sub_containers(&container)? {
                if sub.name != sub_container {
                    continue;
                }
                for leaf in &sub.leaves {
                    out.insert(NamespacePath::new(&container, &sub.name, leaf));
                }
            }
        }
        Ok(out)
    }

    pub fn add_dataset(&mut self, dataset: &Dataset, namespace: &NamespaceConfig) {
        for table in dataset.tables.keys() {
            self.insert(path_for_table(
                &dataset.name,
                table,
                &namespace.sub_container,
                namespace.separate_leaf_containers,
            ));
        }
    }

    /// Add an address. Duplicates are ignored.
    pub fn insert(&mut self, path: NamespacePath) {
        let entry = self.by_dataset.entry(path.container.clone()).or_default();
        let address = KeyspaceAddress(path);
        if !entry.contains(&address) {
            entry.push(address);
        }
    }

    pub fn len(&self) -> usize {
        self.by_dataset.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Addresses grouped by dataset, datasets in name order.
    pub fn grouped(&self) -> &BTreeMap<String, Vec<KeyspaceAddress>> {
        &self.by_dataset
    }

    /// Every address as one flat list.
    pub fn addresses(&self) -> Vec<&KeyspaceAddress> {
        self.by_dataset.values().flatten().collect()
    }

    /// Addresses a query against `dataset` may touch.
    pub fn scope_for(&self, dataset: &str) -> &[KeyspaceAddress] {
        self.by_dataset.get(dataset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Human-readable per-dataset summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (dataset, addresses) in &self.by_dataset {
            out.push_str(&format!("{dataset}: {} keyspace(s)\n", addresses.len()));
            for a in addresses {
                out.push_str(&format!("  - {a}\n"));
            }
        }
        out.push_str(&format!(
            "total: {} keyspace(s) in {} dataset(s)",
            self.len(),
            self.by_dataset.len()
        ));
        out
    }

    /// Write every address on its own line.
    pub fn write_listing(&self, path: impl AsRef<Path>) -> ImportResult<()> {
        let mut w = BufWriter::new(File::create(path)?);
        for a in self.addresses() {
            writeln!(w, "{a}")?;
        }
        w.flush()?;
        Ok(())
    }
}
