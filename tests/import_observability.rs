use std::sync::{Arc, Mutex};

use docstore_import::config::ImportConfig;
use docstore_import::execution::ImportOrchestrator;
use docstore_import::ingestion::{ImportEvent, ImportObserver, ImportSeverity};
use docstore_import::store::MemoryStore;

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<(ImportSeverity, String)>>,
    alerts: Mutex<Vec<ImportSeverity>>,
}

impl ImportObserver for RecordingObserver {
    fn on_event(&self, severity: ImportSeverity, event: &ImportEvent) {
        self.events.lock().unwrap().push((severity, event.to_string()));
    }

    fn on_alert(&self, severity: ImportSeverity, _event: &ImportEvent) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn orchestrator(cfg: ImportConfig, obs: Arc<RecordingObserver>) -> ImportOrchestrator {
    ImportOrchestrator::new(Arc::new(MemoryStore::new()), cfg)
        .unwrap()
        .with_observer(obs)
}

#[test]
fn unreadable_dataset_raises_critical_alert() {
    let obs = Arc::new(RecordingObserver::default());
    let orch = orchestrator(ImportConfig::default().without_delays(), obs.clone());

    let report = orch.import_file("tests/fixtures/does_not_exist.json");
    assert!(report.error.is_some());

    let events = obs.events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, ImportSeverity::Critical);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![ImportSeverity::Critical]);
}

#[test]
fn warnings_do_not_alert_at_default_threshold() {
    let obs = Arc::new(RecordingObserver::default());
    let mut cfg = ImportConfig::default().without_delays();
    cfg.cleaning.enabled = true;
    let orch = orchestrator(cfg, obs.clone());

    let report = orch.import_file("tests/fixtures/datasets/adventure.json");
    assert!(report.error.is_none());

    let events = obs.events.lock().unwrap().clone();
    let warnings: Vec<&String> = events
        .iter()
        .filter(|(s, _)| *s == ImportSeverity::Warning)
        .map(|(_, e)| e)
        .collect();
    // one skipped entry, two mixed columns, two cleaned tables
    assert_eq!(warnings.len(), 5);
    assert!(warnings.iter().any(|e| e.contains("table=schema_version skipped")));
    assert!(warnings.iter().any(|e| e.contains("column=bonus mixed shapes [empty_text, float]")));
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[test]
fn progress_events_follow_configured_interval() {
    let obs = Arc::new(RecordingObserver::default());
    let mut cfg = ImportConfig::default().without_delays();
    cfg.loader.progress_interval = 1;
    let orch = orchestrator(cfg, obs.clone());

    orch.import_file("tests/fixtures/datasets/t_dataset.json");

    let events = obs.events.lock().unwrap().clone();
    let progress: Vec<&String> = events
        .iter()
        .map(|(_, e)| e)
        .filter(|e| e.contains("progress"))
        .collect();
    assert_eq!(progress, vec!["table=t progress 1/2", "table=t progress 2/2"]);
}
