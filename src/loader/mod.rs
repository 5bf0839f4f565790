//! Concurrent bulk loader - synthetic rows under writer contention
//!
//! The loader partitions `[0, total_rows)` across independent worker
//! threads. Each worker owns its connection, runs in WAL mode, and wraps
//! its whole range in one transaction. SQLite accepts a single writer at a
//! time, so a worker whose insert is rejected with a busy/locked error
//! reattempts the same row under a bounded retry budget. Rows that exhaust
//! the budget, or fail for any other reason, are counted and sampled in the
//! final report instead of being dropped.

use crate::storage::store::insert_route;
use crate::storage::RouteStore;
use crate::ui::LoadProgress;
use crate::{DocumentRoute, LoadMessage, Result};
use crossbeam::channel::Sender;
use rusqlite::{Connection, ErrorCode};
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Representative failure causes kept in the report
const FAILURE_SAMPLE_LIMIT: usize = 5;

/// Per-row handling of writer-lock contention.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Reattempts per row before the row is counted as skipped
    pub max_retries: u32,
    /// Sleep between reattempts
    pub backoff: Duration,
    /// Driver-level wait before an attempt reports busy
    pub busy_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 50,
            backoff: Duration::from_millis(1),
            busy_timeout: Duration::from_millis(100),
        }
    }
}

/// Outcome of a bulk load, aggregated across all workers.
///
/// `attempted == inserted + skipped`; under cancellation `attempted` covers
/// only the rows workers reached before exiting their loops.
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub attempted: u64,
    pub inserted: u64,
    pub skipped: u64,
    /// Insert reattempts caused by another connection holding the write lock
    pub contention_retries: u64,
    /// Representative causes for skipped rows (capped)
    pub failure_samples: Vec<String>,
    /// Workers that died before finishing their range (open/commit failures)
    pub worker_errors: Vec<String>,
}

/// Spawns writer workers over partitioned row ranges and aggregates their
/// per-row outcomes.
pub struct BulkLoader {
    db_path: PathBuf,
    workers: usize,
    policy: RetryPolicy,
    cancel: Arc<AtomicBool>,
}

impl BulkLoader {
    pub fn new(db_path: impl AsRef<Path>, workers: usize) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            workers: workers.max(1),
            policy: RetryPolicy::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the contention retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cooperative cancellation signal. Raising it lets in-flight workers
    /// finish their current row, commit what is done, and exit early.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Reset the table and load `total_rows` synthetic routes concurrently.
    ///
    /// Blocks until every worker has joined.
    pub fn run(&self, store: &mut RouteStore, total_rows: u64) -> Result<LoadReport> {
        let deleted = store.delete_all()?;
        tracing::info!(deleted, total_rows, workers = self.workers, "starting bulk load");

        let (tx, rx) = crossbeam::channel::unbounded::<LoadMessage>();
        let mut handles = Vec::with_capacity(self.workers);
        for (worker, range) in partition(total_rows, self.workers).into_iter().enumerate() {
            let path = self.db_path.clone();
            let tx = tx.clone();
            let cancel = Arc::clone(&self.cancel);
            let policy = self.policy;
            handles.push(thread::spawn(move || {
                run_range(worker, &path, range, &tx, &cancel, policy)
            }));
        }
        drop(tx);

        let progress = LoadProgress::new(total_rows);
        let mut report = LoadReport::default();
        for msg in rx {
            match msg {
                LoadMessage::Inserted => {
                    report.attempted += 1;
                    report.inserted += 1;
                    progress.inc();
                }
                LoadMessage::Retried => report.contention_retries += 1,
                LoadMessage::Skipped(cause) => {
                    report.attempted += 1;
                    report.skipped += 1;
                    progress.inc();
                    if report.failure_samples.len() < FAILURE_SAMPLE_LIMIT {
                        report.failure_samples.push(cause);
                    }
                }
            }
        }
        progress.finish();

        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "loader worker failed");
                    report.worker_errors.push(err.to_string());
                }
                Err(_) => report.worker_errors.push("worker panicked".to_string()),
            }
        }

        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped,
            retries = report.contention_retries,
            "bulk load finished"
        );
        Ok(report)
    }
}

/// Split `[0, total_rows)` into up to `workers` contiguous ranges.
///
/// The remainder is spread one row each across the first ranges, so every
/// index is covered. Empty ranges are omitted.
fn partition(total_rows: u64, workers: usize) -> Vec<Range<u64>> {
    let workers = workers.max(1) as u64;
    let base = total_rows / workers;
    let remainder = total_rows % workers;
    let mut ranges = Vec::new();
    let mut start = 0;
    for w in 0..workers {
        let len = base + u64::from(w < remainder);
        if len == 0 {
            continue;
        }
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Worker body: own connection, one transaction over the whole range,
/// per-row busy retry.
fn run_range(
    worker: usize,
    path: &Path,
    range: Range<u64>,
    tx: &Sender<LoadMessage>,
    cancel: &AtomicBool,
    policy: RetryPolicy,
) -> Result<()> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(policy.busy_timeout)?;
    // Switching into WAL takes the write lock briefly, so workers racing
    // through it are themselves subject to the retry policy.
    execute_retrying(&conn, "PRAGMA journal_mode = WAL", policy)?;
    execute_retrying(&conn, "BEGIN TRANSACTION", policy)?;
    tracing::debug!(worker, start = range.start, end = range.end, "worker range started");

    for i in range {
        if cancel.load(Ordering::Relaxed) {
            tracing::debug!(worker, row = i, "cancellation requested, ending range early");
            break;
        }
        let route = DocumentRoute::synthetic(i);
        let mut retries = 0u32;
        loop {
            match insert_route(&conn, &route) {
                Ok(_) => {
                    let _ = tx.send(LoadMessage::Inserted);
                    break;
                }
                Err(err) if is_contention(&err) => {
                    let _ = tx.send(LoadMessage::Retried);
                    retries += 1;
                    if retries > policy.max_retries {
                        let _ = tx.send(LoadMessage::Skipped(format!(
                            "row {i}: retry budget exhausted: {err}"
                        )));
                        break;
                    }
                    thread::sleep(policy.backoff);
                }
                Err(err) => {
                    let _ = tx.send(LoadMessage::Skipped(format!("row {i}: {err}")));
                    break;
                }
            }
        }
    }

    execute_retrying(&conn, "COMMIT", policy)?;
    Ok(())
}

/// Run a statement, reattempting busy/locked rejections under the policy
fn execute_retrying(conn: &Connection, sql: &str, policy: RetryPolicy) -> rusqlite::Result<()> {
    let mut retries = 0u32;
    loop {
        match conn.execute_batch(sql) {
            Ok(()) => return Ok(()),
            Err(err) if is_contention(&err) && retries < policy.max_retries => {
                retries += 1;
                thread::sleep(policy.backoff);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Did the backend reject the write because another connection holds the
/// write lock?
fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ConnectionManager, SchemaAdmin};

    fn setup(dir: &tempfile::TempDir) -> (PathBuf, ConnectionManager) {
        let path = dir.path().join("routes.db");
        let mut manager = ConnectionManager::new(&path);
        SchemaAdmin::new(&mut manager).init_schema().unwrap();
        (path, manager)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 100,
            backoff: Duration::from_millis(1),
            busy_timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_partition_covers_all_rows() {
        assert_eq!(partition(10, 2), vec![0..5, 5..10]);
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(3, 8), vec![0..1, 1..2, 2..3]);
        assert_eq!(partition(0, 4), Vec::<Range<u64>>::new());

        // No index lost, none doubled
        let ranges = partition(1000, 7);
        let covered: u64 = ranges.iter().map(|r| r.end - r.start).sum();
        assert_eq!(covered, 1000);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_concurrent_load_completeness() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut manager) = setup(&dir);
        let mut store = RouteStore::new(&mut manager);

        let loader = BulkLoader::new(&path, 4).with_policy(fast_policy());
        let report = loader.run(&mut store, 1000).unwrap();

        assert!(report.worker_errors.is_empty(), "{:?}", report.worker_errors);
        assert_eq!(report.attempted, 1000);
        assert_eq!(report.inserted, 1000);
        assert_eq!(report.skipped, 0);
        assert_eq!(store.count_rows().unwrap(), 1000);

        // Every synthesized row is present exactly once and reachable from
        // both sides; the unique (name, revision) constraint rules out a
        // retried-but-committed duplicate.
        for i in [0, 499, 999] {
            let expected = DocumentRoute::synthetic(i);
            assert_eq!(store.find_by_uuid(&expected.client_uuid).unwrap(), expected);
            assert_eq!(store.find_by_uuid(&expected.contractor_uuid).unwrap(), expected);
        }
    }

    #[test]
    fn test_two_workers_ten_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut manager) = setup(&dir);
        let mut store = RouteStore::new(&mut manager);

        let loader = BulkLoader::new(&path, 2).with_policy(fast_policy());
        let report = loader.run(&mut store, 10).unwrap();

        assert_eq!(report.inserted, 10);
        assert_eq!(store.count_rows().unwrap(), 10);
    }

    #[test]
    fn test_load_replaces_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut manager) = setup(&dir);

        RouteStore::new(&mut manager)
            .insert(&DocumentRoute::new("old", "R9", "g1", 1, 1, "g2", 2, 2))
            .unwrap();

        let mut store = RouteStore::new(&mut manager);
        let loader = BulkLoader::new(&path, 2).with_policy(fast_policy());
        loader.run(&mut store, 6).unwrap();

        assert_eq!(store.count_rows().unwrap(), 6);
        assert!(store.find_by_uuid("g1").is_err());
    }

    #[test]
    fn test_contention_retry_commits_row() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut manager) = setup(&dir);

        // Already-WAL keeps the worker's journal pragma a lock-free no-op
        Connection::open(&path)
            .unwrap()
            .execute_batch("PRAGMA journal_mode = WAL")
            .unwrap();

        // Hold the write lock before the worker starts, so its first
        // insert is guaranteed to see contention.
        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let (tx, rx) = crossbeam::channel::unbounded::<LoadMessage>();
        let cancel = AtomicBool::new(false);
        let worker_path = path.clone();
        let handle = thread::spawn(move || {
            run_range(0, &worker_path, 0..5, &tx, &cancel, fast_policy())
        });

        thread::sleep(Duration::from_millis(150));
        blocker.execute_batch("COMMIT").unwrap();
        handle.join().unwrap().unwrap();

        let mut inserted = 0u64;
        let mut retried = 0u64;
        for msg in rx {
            match msg {
                LoadMessage::Inserted => inserted += 1,
                LoadMessage::Retried => retried += 1,
                LoadMessage::Skipped(cause) => panic!("unexpected skip: {cause}"),
            }
        }
        assert_eq!(inserted, 5);
        assert!(retried >= 1, "worker never hit the held write lock");
        assert_eq!(RouteStore::new(&mut manager).count_rows().unwrap(), 5);
    }

    #[test]
    fn test_retry_budget_exhaustion_reports_skips() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut manager) = setup(&dir);

        Connection::open(&path)
            .unwrap()
            .execute_batch("PRAGMA journal_mode = WAL")
            .unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let tight = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
            busy_timeout: Duration::from_millis(1),
        };
        let (tx, rx) = crossbeam::channel::unbounded::<LoadMessage>();
        let cancel = AtomicBool::new(false);
        let worker_path = path.clone();
        let handle =
            thread::spawn(move || run_range(0, &worker_path, 0..3, &tx, &cancel, tight));
        handle.join().unwrap().unwrap();
        blocker.execute_batch("COMMIT").unwrap();

        let skips: Vec<String> = rx
            .iter()
            .filter_map(|msg| match msg {
                LoadMessage::Skipped(cause) => Some(cause),
                _ => None,
            })
            .collect();
        assert_eq!(skips.len(), 3);
        assert!(skips[0].contains("retry budget exhausted"));
        assert_eq!(RouteStore::new(&mut manager).count_rows().unwrap(), 0);
    }

    #[test]
    fn test_cancellation_before_start_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (path, mut manager) = setup(&dir);
        let mut store = RouteStore::new(&mut manager);

        let loader = BulkLoader::new(&path, 2).with_policy(fast_policy());
        loader.cancel_flag().store(true, Ordering::Relaxed);
        let report = loader.run(&mut store, 100).unwrap();

        assert_eq!(report.attempted, 0);
        assert_eq!(report.inserted, 0);
        assert!(report.worker_errors.is_empty());
        assert_eq!(store.count_rows().unwrap(), 0);
    }
}
