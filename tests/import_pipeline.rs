use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use docstore_import::config::ImportConfig;
use docstore_import::execution::ImportOrchestrator;
use docstore_import::ingestion::{read_dataset_from_path, read_dataset_from_str};
use docstore_import::report::TableOutcome;
use docstore_import::store::MemoryStore;
use docstore_import::types::NamespacePath;
use serde_json::json;

fn config() -> ImportConfig {
    ImportConfig::default().without_delays()
}

fn cleaning_config() -> ImportConfig {
    let mut cfg = config();
    cfg.cleaning.enabled = true;
    cfg
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "docstore-import-{tag}-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn end_to_end_single_table_with_cleaning() {
    let store = Arc::new(MemoryStore::new());
    let orch = ImportOrchestrator::new(store.clone(), cleaning_config()).unwrap();

    let report = orch.import_file("tests/fixtures/datasets/t_dataset.json");
    assert!(report.error.is_none());
    assert_eq!(report.cleaning.unwrap().values_replaced, 1);

    let t = report.table("t").unwrap();
    assert_eq!(t.outcome, TableOutcome::Loaded);
    assert_eq!((t.success_count, t.error_count), (2, 0));

    let path = NamespacePath::new("t_dataset", "spider2", "t");
    assert!(store.has_path(&path));
    let first = store.document(&path, "t_1").unwrap();
    assert_eq!(first["amount"], json!(null));
    assert_eq!(first["_table"], json!("t"));
    assert_eq!(first["_source"], json!("t_dataset.json"));
    assert_eq!(store.document(&path, "t_2").unwrap()["amount"], json!(5));
}

#[test]
fn wrapped_and_plain_tables_load_with_natural_keys() {
    let store = Arc::new(MemoryStore::new());
    let orch = ImportOrchestrator::new(store.clone(), cleaning_config()).unwrap();

    let report = orch.import_file("tests/fixtures/datasets/adventure.json");
    let cleaning = report.cleaning.unwrap();
    assert_eq!(cleaning.tables_processed, 3);
    assert_eq!(cleaning.columns_cleaned, 2);
    assert_eq!(cleaning.values_replaced, 2);
    assert_eq!(report.mixed_columns.as_ref().unwrap().column_count(), 2);

    assert_eq!(report.tables_succeeded(), 3);
    assert_eq!(report.tables_skipped(), 1);
    assert_eq!(report.documents_loaded(), 7);

    let person = NamespacePath::new("adventure", "spider2", "person");
    let terri = store.document(&person, "person_2").unwrap();
    assert_eq!(terri["bonus"], json!(null));
    assert_eq!(terri["middlename"], json!(""));

    let orders = NamespacePath::new("adventure", "spider2", "salesorder");
    assert_eq!(store.document(&orders, "salesorder_43660").unwrap()["status"], json!(null));

    let lookup = NamespacePath::new("adventure", "spider2", "lookup");
    assert_eq!(store.document(&lookup, "lookup_2").unwrap()["code"], json!("I"));
}

#[test]
fn document_arrays_land_in_default_collection() {
    let store = Arc::new(MemoryStore::new());
    let orch = ImportOrchestrator::new(store.clone(), config()).unwrap();

    let report = orch.import_file("tests/fixtures/datasets/documents.json");
    assert_eq!(report.documents_loaded(), 2);

    let path = NamespacePath::new("documents", "_default", "_default");
    assert_eq!(store.document(&path, "doc_u-1").unwrap()["name"], json!("Ada"));
    assert_eq!(store.document(&path, "doc_2").unwrap()["name"], json!("Grace"));
    assert_eq!(store.creation_count(), 1);
}

#[test]
fn reimport_overwrites_and_creates_nothing_new() {
    let store = Arc::new(MemoryStore::new());
    let orch = ImportOrchestrator::new(store.clone(), config()).unwrap();

    orch.import_file("tests/fixtures/datasets/adventure.json");
    let created = store.creation_count();
    let keyspaces = store.keyspaces();

    let again = orch.import_file("tests/fixtures/datasets/adventure.json");
    assert_eq!(again.documents_loaded(), 7);
    assert_eq!(store.creation_count(), created);
    assert_eq!(store.keyspaces(), keyspaces);
    assert_eq!(
        store.document_count(&NamespacePath::new("adventure", "spider2", "person")),
        3
    );
}

#[test]
fn failing_table_does_not_stop_siblings_or_datasets() {
    let store = Arc::new(MemoryStore::new());
    store.fail_leaf("salesorder");
    store.fail_key("lookup_1");
    let orch = ImportOrchestrator::new(store.clone(), config()).unwrap();

    let report = orch.import_datasets(vec![
        read_dataset_from_path("tests/fixtures/datasets/adventure.json").unwrap(),
        read_dataset_from_path("tests/fixtures/datasets/t_dataset.json").unwrap(),
    ]);

    let adventure = report.dataset("adventure").unwrap();
    let orders = adventure.table("salesorder").unwrap();
    assert!(matches!(orders.outcome, TableOutcome::ProvisioningFailed { .. }));
    assert_eq!(orders.success_count + orders.error_count, 0);

    let lookup = adventure.table("lookup").unwrap();
    assert_eq!((lookup.success_count, lookup.error_count), (1, 1));
    assert_eq!(lookup.failures[0].key, "lookup_1");

    let totals = report.totals();
    assert_eq!(totals.datasets_processed, 2);
    assert_eq!(totals.tables_succeeded, 3);
    assert_eq!(totals.tables_failed, 1);
    assert_eq!(totals.tables_skipped, 1);
    assert_eq!(totals.documents_loaded, 6);
    assert_eq!(totals.documents_failed, 1);
    assert!(!report.is_clean());
}

#[test]
fn statement_path_unavailable_falls_back_to_management_api() {
    let store = Arc::new(MemoryStore::new());
    store.disable_statements();
    let orch = ImportOrchestrator::new(store.clone(), config()).unwrap();

    let report = orch.import_file("tests/fixtures/datasets/t_dataset.json");
    assert_eq!(report.tables_succeeded(), 1);
    assert!(store.has_path(&NamespacePath::new("t_dataset", "spider2", "t")));
}

#[test]
fn shared_leaf_mode_writes_every_table_to_default() {
    let store = Arc::new(MemoryStore::new());
    let mut cfg = config();
    cfg.namespace.separate_leaf_containers = false;
    let orch = ImportOrchestrator::new(store.clone(), cfg).unwrap();

    let ds = read_dataset_from_str("shop", "shop.json", r#"{"a": [{"id": 1}], "b": [{"id": 1}]}"#).unwrap();
    let report = orch.import_dataset(ds);

    assert_eq!(report.tables_succeeded(), 2);
    let path = NamespacePath::new("shop", "_default", "_default");
    assert_eq!(store.document_count(&path), 2);
    assert_eq!(store.document(&path, "b_1").unwrap()["_table"], json!("b"));
}

#[test]
fn directory_import_records_bad_files_and_continues() {
    let dir = temp_dir("dir-import");
    std::fs::copy("tests/fixtures/datasets/t_dataset.json", dir.join("t_dataset.json")).unwrap();
    std::fs::write(dir.join("broken.json"), "{not json").unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let store = Arc::new(MemoryStore::new());
    let orch = ImportOrchestrator::new(store.clone(), config()).unwrap();
    let report = orch.import_directory(&dir, false).unwrap();

    let names: Vec<&str> = report.datasets.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["broken", "t_dataset"]);
    assert!(report.dataset("broken").unwrap().error.is_some());
    assert_eq!(report.dataset("t_dataset").unwrap().documents_loaded(), 2);
    assert_eq!(report.totals().datasets_failed, 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn rewriting_source_files_keeps_the_first_backup() {
    let dir = temp_dir("rewrite");
    let file = dir.join("t_dataset.json");
    std::fs::copy("tests/fixtures/datasets/t_dataset.json", &file).unwrap();
    let original = std::fs::read(&file).unwrap();

    let mut cfg = cleaning_config();
    cfg.cleaning.rewrite_source_files = true;
    let orch = ImportOrchestrator::new(Arc::new(MemoryStore::new()), cfg).unwrap();

    let first = orch.import_file(&file);
    let backup = first.backup_created.clone().unwrap();
    assert_eq!(backup, dir.join("t_dataset.json.backup"));
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    let rewritten = read_dataset_from_path(&file).unwrap();
    assert_eq!(rewritten.tables["t"].rows[0]["amount"], docstore_import::types::Value::Null);

    let second = orch.import_file(&file);
    assert_eq!(second.cleaning.unwrap().values_replaced, 0);
    assert!(second.backup_created.is_none());
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_directory_is_an_error() {
    let orch = ImportOrchestrator::new(Arc::new(MemoryStore::new()), config()).unwrap();
    assert!(orch.import_directory("tests/fixtures/does_not_exist", false).is_err());
}
