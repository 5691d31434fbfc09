use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Real-time counters for an import run.
///
/// The orchestrator updates these while tables load (possibly from several worker threads);
/// callers can snapshot them at any time.
pub struct ImportMetrics {
    run_id: AtomicU64,
    started_at: Mutex<Option<Instant>>,
    elapsed_ns: AtomicU64,

    datasets_started: AtomicU64,
    tables_started: AtomicU64,
    tables_finished: AtomicU64,
    documents_loaded: AtomicU64,
    documents_failed: AtomicU64,

    active_tables: AtomicUsize,
    max_active_tables: AtomicUsize,
}

impl ImportMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            started_at: Mutex::new(None),
            elapsed_ns: AtomicU64::new(0),
            datasets_started: AtomicU64::new(0),
            tables_started: AtomicU64::new(0),
            tables_finished: AtomicU64::new(0),
            documents_loaded: AtomicU64::new(0),
            documents_failed: AtomicU64::new(0),
            active_tables: AtomicUsize::new(0),
            max_active_tables: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut started) = self.started_at.lock() {
            *started = Some(Instant::now());
        }

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.datasets_started.store(0, Ordering::SeqCst);
        self.tables_started.store(0, Ordering::SeqCst);
        self.tables_finished.store(0, Ordering::SeqCst);
        self.documents_loaded.store(0, Ordering::SeqCst);
        self.documents_failed.store(0, Ordering::SeqCst);
        self.active_tables.store(0, Ordering::SeqCst);
        self.max_active_tables.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self) {
        let elapsed = self
            .started_at
            .lock()
            .ok()
            .and_then(|started| started.map(|s| s.elapsed()))
            .unwrap_or_default();
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_dataset_start(&self) {
        let _ = self.datasets_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_table_start(&self) {
        let _ = self.tables_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_tables.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_tables, now);
    }

    pub fn on_table_end(&self, loaded: usize, failed: usize) {
        let _ = self.documents_loaded.fetch_add(loaded as u64, Ordering::SeqCst);
        let _ = self.documents_failed.fetch_add(failed as u64, Ordering::SeqCst);
        let _ = self.tables_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_tables.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ImportMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns));

        ImportMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            datasets_started: self.datasets_started.load(Ordering::SeqCst),
            tables_started: self.tables_started.load(Ordering::SeqCst),
            tables_finished: self.tables_finished.load(Ordering::SeqCst),
            documents_loaded: self.documents_loaded.load(Ordering::SeqCst),
            documents_failed: self.documents_failed.load(Ordering::SeqCst),
            max_active_tables: self.max_active_tables.load(Ordering::SeqCst),
        }
    }
}

impl Default for ImportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ImportMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ImportMetrics").field(&self.snapshot()).finish()
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    let _ = dst.fetch_max(now, Ordering::SeqCst);
}

/// Immutable snapshot of [`ImportMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub datasets_started: u64,
    pub tables_started: u64,
    pub tables_finished: u64,
    pub documents_loaded: u64,
    pub documents_failed: u64,
    pub max_active_tables: usize,
}

impl fmt::Display for ImportMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, datasets={}, tables={}/{}, documents_loaded={}, documents_failed={}, max_active_tables={}, elapsed={:?}",
            self.run_id,
            self.datasets_started,
            self.tables_finished,
            self.tables_started,
            self.documents_loaded,
            self.documents_failed,
            self.max_active_tables,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_reset_per_run() {
        let m = ImportMetrics::new();
        m.begin_run();
        m.on_dataset_start();
        m.on_table_start();
        m.on_table_start();
        m.on_table_end(10, 1);
        m.on_table_end(5, 0);
        m.end_run();

        let snap = m.snapshot();
        assert_eq!(snap.run_id, 1);
        assert_eq!(snap.tables_started, 2);
        assert_eq!(snap.tables_finished, 2);
        assert_eq!(snap.documents_loaded, 15);
        assert_eq!(snap.documents_failed, 1);
        assert_eq!(snap.max_active_tables, 2);

        m.begin_run();
        let snap = m.snapshot();
        assert_eq!(snap.run_id, 2);
        assert_eq!(snap.documents_loaded, 0);
        assert!(snap.elapsed.is_none());
    }
}
