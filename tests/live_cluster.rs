#![cfg(feature = "live_tests")]
//! Runs against a real cluster. Connection comes from `DOCSTORE_HOST`, `DOCSTORE_USERNAME` and
//! `DOCSTORE_PASSWORD`; the cluster must allow bucket creation.

use std::sync::Arc;

use docstore_import::config::{ConnectionConfig, ImportConfig};
use docstore_import::execution::ImportOrchestrator;
use docstore_import::ingestion::read_dataset_from_str;
use docstore_import::registry::KeyspaceRegistry;
use docstore_import::store::HttpStore;

#[test]
fn import_then_list_keyspaces() {
    let mut cfg = ImportConfig::default();
    cfg.connection = ConnectionConfig::default().with_env_overrides();
    cfg.cleaning.enabled = true;

    let store = Arc::new(HttpStore::new(&cfg.connection).unwrap());
    let orch = ImportOrchestrator::new(store.clone(), cfg).unwrap();

    let ds = read_dataset_from_str(
        "docstore_import_live",
        "docstore_import_live.json",
        r#"{"t": [{"id": 1, "amount": ""}, {"id": 2, "amount": 5}]}"#,
    )
    .unwrap();

    let first = orch.import_dataset(ds.clone());
    assert_eq!(first.tables_succeeded(), 1, "{first:?}");
    assert_eq!(first.documents_loaded(), 2);

    let second = orch.import_dataset(ds);
    assert_eq!(second.documents_loaded(), 2);

    let reg = KeyspaceRegistry::from_store(&*store, "spider2").unwrap();
    let scope: Vec<String> = reg
        .scope_for("docstore_import_live")
        .iter()
        .map(|a| a.to_string())
        .collect();
    assert_eq!(scope, vec!["docstore_import_live.spider2.t"]);
}
