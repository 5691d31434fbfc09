//! `docstore-import` loads table-shaped JSON datasets into a bucket/scope/collection document
//! store (Couchbase and compatible clusters).
//!
//! One dataset file becomes one container; each table becomes a leaf container under a fixed
//! sub-container (`<dataset>.spider2.<table>` by default), and each row becomes a document. Along
//! the way the importer:
//!
//! - creates missing namespaces idempotently, falling back from declarative statements to the
//!   management API
//! - derives stable document keys (`id`, then alternate natural keys, then row position) so
//!   re-imports overwrite rather than duplicate
//! - optionally replaces empty strings with null in numeric columns, keeping a one-time backup of
//!   any source file it rewrites
//! - isolates failures per row, per table and per dataset, and always returns a full report
//!
//! ## Supported inputs
//!
//! - `{"orders": [{"id": 1}, ...], ...}`: table name to rows
//! - `{"orders": {"data": [...], "row_count": 2}, ...}`: table name to a wrapper with a `data` array
//! - `[{"id": 1}, ...]`: a bare array of documents, imported into `<dataset>._default._default`
//!
//! Row values must be scalars (null, bool, number, string). A table with any other value, or an
//! entry with an unrecognized shape, is skipped and reported; the rest of the file still loads.
//!
//! ## Quick example: import a directory
//!
//! ```no_run
//! use std::sync::Arc;
//! use docstore_import::config::{ConnectionConfig, ImportConfig};
//! use docstore_import::execution::ImportOrchestrator;
//! use docstore_import::ingestion::TracingObserver;
//! use docstore_import::store::HttpStore;
//!
//! # fn main() -> Result<(), docstore_import::ImportError> {
//! let mut config = ImportConfig::from_json_path("import.json")?;
//! config.connection = config.connection.with_env_overrides();
//! config.cleaning.enabled = true;
//!
//! let store = Arc::new(HttpStore::new(&config.connection)?);
//! let orchestrator = ImportOrchestrator::new(store, config)?
//!     .with_observer(Arc::new(TracingObserver));
//!
//! let report = orchestrator.import_directory("datasets/", false)?;
//! println!("{report}");
//! report.write_csv("import_report.csv")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Keyspace listing
//!
//! ```rust
//! use docstore_import::config::NamespaceConfig;
//! use docstore_import::ingestion::read_dataset_from_str;
//! use docstore_import::registry::KeyspaceRegistry;
//!
//! let ds = read_dataset_from_str("shop", "shop.json", r#"{"orders": [], "items": []}"#).unwrap();
//! let registry = KeyspaceRegistry::from_datasets(&[ds], &NamespaceConfig::default());
//! let scope: Vec<String> = registry.scope_for("shop").iter().map(|a| a.to_string()).collect();
//! assert_eq!(scope, vec!["shop.spider2.orders", "shop.spider2.items"]);
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: reading/writing dataset files, discovery, observer hooks
//! - [`processing`]: value shapes, mixed-column analysis, empty-string normalization
//! - [`provisioning`]: idempotent namespace creation with ordered fallback strategies
//! - [`loading`]: key derivation and per-row document upserts
//! - [`execution`]: the import orchestrator, cancellation and run metrics
//! - [`registry`]: keyspace address listing for query-time scope resolution
//! - [`report`]: per-table, per-dataset and run totals, with CSV export
//! - [`store`]: the [`store::DocumentStore`] seam, an HTTP client and an in-memory store
//! - [`config`], [`types`], [`error`]

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod loading;
pub mod processing;
pub mod provisioning;
pub mod registry;
pub mod report;
pub mod store;
pub mod types;

pub use error::{ImportError, ImportResult, StoreError, StoreResult};
