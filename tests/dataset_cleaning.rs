use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use docstore_import::ingestion::read_dataset_from_path;
use docstore_import::processing::{analyze_dataset, backup_path_for, clean_dataset_file};
use docstore_import::types::Value;

fn copy_fixture(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "docstore-import-clean-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let dst = dir.join(name);
    std::fs::copy(format!("tests/fixtures/datasets/{name}"), &dst).unwrap();
    dst
}

#[test]
fn mixed_column_report_lists_type_combinations() {
    let ds = read_dataset_from_path("tests/fixtures/datasets/adventure.json").unwrap();
    let report = analyze_dataset(&ds);

    assert_eq!(report.column_count(), 2);
    let combos = report.type_combinations();
    assert_eq!(combos.get("empty_text, float"), Some(&1));
    assert_eq!(combos.get("empty_text, int"), Some(&1));

    let text = report.to_string();
    assert!(text.contains("Table: person"));
    assert!(text.contains("- status: empty_text, int"));
    assert!(!text.contains("middlename"));
}

#[test]
fn cleaning_a_file_backs_up_once_and_is_idempotent() {
    let file = copy_fixture("adventure.json");
    let original = std::fs::read(&file).unwrap();

    let first = clean_dataset_file(&file, false).unwrap();
    assert!(first.rewritten);
    assert_eq!(first.cleaning.stats.values_replaced, 2);
    let backup = backup_path_for(&file);
    assert_eq!(first.backup_created.as_deref(), Some(backup.as_path()));
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    let cleaned = read_dataset_from_path(&file).unwrap();
    assert_eq!(cleaned.tables["person"].rows[1]["bonus"], Value::Null);
    assert_eq!(cleaned.tables["person"].rows[1]["middlename"], Value::Utf8(String::new()));
    assert_eq!(cleaned.skipped.len(), 1);

    let second = clean_dataset_file(&file, false).unwrap();
    assert_eq!(second.cleaning.stats.values_replaced, 0);
    assert!(!second.rewritten);
    assert!(second.backup_created.is_none());
    assert_eq!(std::fs::read(&backup).unwrap(), original);

    let _ = std::fs::remove_dir_all(file.parent().unwrap());
}

#[test]
fn dry_run_counts_without_touching_the_file() {
    let file = copy_fixture("t_dataset.json");
    let original = std::fs::read(&file).unwrap();

    let out = clean_dataset_file(&file, true).unwrap();
    assert_eq!(out.cleaning.stats.values_replaced, 1);
    assert!(!out.rewritten);
    assert_eq!(std::fs::read(&file).unwrap(), original);
    assert!(!backup_path_for(&file).exists());

    let _ = std::fs::remove_dir_all(file.parent().unwrap());
}
