//! Write-behind cache.
//!
//! Deferred inserts and deletes are staged in per-table queues and applied
//! to the store in batches:
//! - periodically, by a background thread (every 5 s by default)
//! - when an insert brings its table's queue to the batch size
//! - before every read of that table
//! - once more at shutdown
//!
//! A flush detaches the table's whole queue and replays it in one
//! transaction. Detaching happens while the connection lock is held, so
//! batches for one table commit in the order they were detached, and callers
//! enqueuing meanwhile build the next batch instead of waiting.

pub mod listeners;
pub mod queue;
pub mod scheduler;

pub use listeners::{FailureListeners, FlushFailure};
pub use queue::{CacheConfig, PendingOperation, PendingQueue};

use std::collections::HashMap;
use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use rusqlite::Connection;

use crate::error::{OperationKind, Result, StorageError};
use crate::observability::metrics;
use crate::storage::sql;
use crate::storage::Backend;
use crate::types::{Predicate, Row};

use self::scheduler::Scheduler;

/// Per-table staging of deferred writes.
#[derive(Debug)]
pub struct WriteCache {
    backend: Arc<Backend>,
    config: CacheConfig,
    pending: Mutex<HashMap<String, PendingQueue>>,
    listeners: FailureListeners,
    scheduler: Mutex<Option<Scheduler>>,
    shut_down: AtomicBool,
}

impl WriteCache {
    pub fn new(backend: Arc<Backend>, config: CacheConfig) -> Self {
        Self {
            backend,
            config,
            pending: Mutex::new(HashMap::new()),
            listeners: FailureListeners::new(),
            scheduler: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Start the periodic flush thread.
    ///
    /// The thread only holds a weak reference: dropping the last `Arc` ends
    /// it at the next tick. Starting twice is a no-op.
    pub fn start(self: &Arc<Self>) -> io::Result<()> {
        let mut slot = self.lock_scheduler();
        if slot.is_some() || self.shut_down.load(Ordering::SeqCst) {
            tracing::warn!("Write cache already started or shut down, ignoring start");
            return Ok(());
        }

        let cache = Arc::downgrade(self);
        let scheduler = Scheduler::spawn(self.config.flush_interval, move || {
            let Some(cache) = cache.upgrade() else {
                return ControlFlow::Break(());
            };
            if let Err(e) = cache.flush_all() {
                tracing::error!(error = %e, "Periodic flush failed");
            }
            ControlFlow::Continue(())
        })?;
        *slot = Some(scheduler);

        tracing::info!(
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Write cache started"
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_scheduler().is_some()
    }

    /// Stage an insert.
    ///
    /// If the table's queue reaches the batch size, the table is flushed
    /// before returning and a flush error is returned to this caller.
    pub fn queue_insert(&self, table: &str, row: Row) -> Result<()> {
        if row.is_empty() {
            return Err(StorageError::InvalidOperation(format!(
                "insert into `{table}` has no columns"
            )));
        }

        let full = {
            let mut pending = self.lock_pending();
            self.ensure_accepting()?;
            pending
                .entry(table.to_string())
                .or_insert_with(|| PendingQueue::new(self.config.batch_size))
                .push(PendingOperation::Insert(row))
        };

        if full {
            tracing::debug!(table, "Pending queue reached batch size, flushing");
            match self.flush_table(table) {
                // The final drain already took this batch.
                Err(StorageError::Closed) if self.shut_down.load(Ordering::SeqCst) => {}
                result => {
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Stage a delete.
    ///
    /// Deletes never trigger the batch-size flush; they ride along with the
    /// next insert-triggered, periodic or read flush.
    pub fn queue_delete(&self, table: &str, predicate: Predicate) -> Result<()> {
        if predicate.is_empty() {
            return Err(StorageError::InvalidOperation(format!(
                "delete from `{table}` without a predicate"
            )));
        }

        let mut pending = self.lock_pending();
        self.ensure_accepting()?;
        pending
            .entry(table.to_string())
            .or_insert_with(|| PendingQueue::new(self.config.batch_size))
            .push(PendingOperation::Delete(predicate));
        Ok(())
    }

    /// Apply a table's pending operations in one transaction.
    ///
    /// Returns the number of operations committed (0 if nothing was pending).
    /// On failure the batch is rolled back and discarded, never re-queued;
    /// failure subscribers are notified.
    pub fn flush_table(&self, table: &str) -> Result<usize> {
        self.backend.with_connection(|conn| {
            let Some(queue) = self.lock_pending().remove(table) else {
                return Ok(0);
            };
            let ops = queue.into_operations();
            if ops.is_empty() {
                return Ok(0);
            }

            let started = Instant::now();
            match apply_batch(conn, table, &ops) {
                Ok(()) => {
                    metrics::record_flush(table, ops.len(), started.elapsed());
                    tracing::debug!(table, operations = ops.len(), "Flushed pending operations");
                    Ok(ops.len())
                }
                Err(source) => {
                    let err = StorageError::storage(table, OperationKind::Flush, source);
                    metrics::record_flush_failure(table);
                    tracing::error!(
                        table,
                        discarded = ops.len(),
                        error = %err,
                        "Flush failed, batch rolled back"
                    );
                    self.listeners.notify(&FlushFailure {
                        table: table.to_string(),
                        discarded: ops.len(),
                        error: err.to_string(),
                    });
                    Err(err)
                }
            }
        })
    }

    /// Flush every table with pending work, one after another.
    ///
    /// All tables are attempted; the first error is returned.
    pub fn flush_all(&self) -> Result<()> {
        let tables = self.pending_tables();
        if tables.is_empty() {
            return Ok(());
        }

        tracing::debug!(tables = tables.len(), "Flushing all tables");
        let mut first_error = None;
        for table in &tables {
            if let Err(e) = self.flush_table(table) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stop the scheduler, then drain every queue.
    ///
    /// After this, enqueues fail with [`StorageError::Closed`]. Calling it
    /// again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        // Flipped under the queue lock: every enqueue either lands before
        // this point and is drained below, or fails with `Closed`.
        if self.mark_shut_down() {
            return Ok(());
        }

        tracing::info!("Shutting down write cache");
        let scheduler = self.lock_scheduler().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop(self.config.shutdown_timeout);
        }

        let result = self.flush_all();
        tracing::info!("Write cache shutdown complete");
        result
    }

    /// Subscribe to failed-flush notifications.
    pub fn subscribe_failures(&self) -> Receiver<FlushFailure> {
        self.listeners.subscribe()
    }

    /// Number of operations waiting for `table`.
    pub fn pending_count(&self, table: &str) -> usize {
        self.lock_pending().get(table).map_or(0, PendingQueue::len)
    }

    /// Tables with pending work, sorted by name.
    pub fn pending_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self
            .lock_pending()
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        tables.sort();
        tables
    }

    /// Mark the cache shut down. Returns true if it already was.
    fn mark_shut_down(&self) -> bool {
        let _pending = self.lock_pending();
        self.shut_down.swap(true, Ordering::SeqCst)
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingQueue>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_scheduler(&self) -> MutexGuard<'_, Option<Scheduler>> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Replay `ops` in order inside one transaction.
fn apply_batch(conn: &mut Connection, table: &str, ops: &[PendingOperation]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;

    let applied = ops.iter().try_for_each(|op| {
        match op {
            PendingOperation::Insert(row) => sql::execute_insert(&tx, table, row)?,
            PendingOperation::Delete(predicate) => sql::execute_delete(&tx, table, predicate)?,
        };
        Ok::<(), rusqlite::Error>(())
    });

    match applied {
        Ok(()) => tx.commit(),
        Err(e) => {
            if let Err(rollback) = tx.rollback() {
                tracing::error!(table, error = %rollback, "Failed to roll back flush");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, TableSchema, Value};
    use std::sync::{mpsc, Barrier};
    use std::thread;
    use std::time::Duration;

    fn setup(config: CacheConfig) -> (Arc<Backend>, Arc<WriteCache>) {
        let backend = Arc::new(Backend::open_in_memory().unwrap());
        let schema = TableSchema::builder("t")
            .not_null_column("id", ColumnType::Integer)
            .column("name", ColumnType::Text)
            .primary_key(["id"])
            .build();
        backend
            .with_connection(|conn| {
                conn.execute(&sql::create_table_sql(&schema), []).unwrap();
                Ok(())
            })
            .unwrap();
        let cache = Arc::new(WriteCache::new(Arc::clone(&backend), config));
        (backend, cache)
    }

    fn count_rows(backend: &Backend, table: &str) -> usize {
        backend
            .with_connection(|conn| Ok(sql::query_rows(conn, table, &Predicate::all()).unwrap().len()))
            .unwrap()
    }

    #[test]
    fn test_queue_insert_stays_pending() {
        let (backend, cache) = setup(CacheConfig::test_config());

        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();

        assert_eq!(cache.pending_count("t"), 1);
        assert_eq!(count_rows(&backend, "t"), 0);
    }

    #[test]
    fn test_flush_table_applies_in_order() {
        let (backend, cache) = setup(CacheConfig::test_config());

        cache.queue_insert("t", Row::new().set("id", 1).set("name", "a")).unwrap();
        cache.queue_delete("t", Predicate::new().eq("id", 1)).unwrap();
        cache.queue_insert("t", Row::new().set("id", 2).set("name", "b")).unwrap();

        assert_eq!(cache.flush_table("t").unwrap(), 3);
        assert_eq!(cache.pending_count("t"), 0);

        let rows = backend
            .with_connection(|conn| Ok(sql::query_rows(conn, "t", &Predicate::all()).unwrap()))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_flush_empty_table_is_noop() {
        let (_backend, cache) = setup(CacheConfig::test_config());
        assert_eq!(cache.flush_table("t").unwrap(), 0);
        assert_eq!(cache.flush_table("missing").unwrap(), 0);
    }

    #[test]
    fn test_batch_size_triggers_flush() {
        let config = CacheConfig {
            batch_size: 3,
            ..CacheConfig::test_config()
        };
        let (backend, cache) = setup(config);

        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();
        cache.queue_insert("t", Row::new().set("id", 2)).unwrap();
        assert_eq!(count_rows(&backend, "t"), 0);

        cache.queue_insert("t", Row::new().set("id", 3)).unwrap();
        assert_eq!(count_rows(&backend, "t"), 3);
        assert_eq!(cache.pending_count("t"), 0);
    }

    #[test]
    fn test_deletes_never_trigger_flush() {
        let config = CacheConfig {
            batch_size: 2,
            ..CacheConfig::test_config()
        };
        let (_backend, cache) = setup(config);

        for id in 0..5 {
            cache.queue_delete("t", Predicate::new().eq("id", id)).unwrap();
        }

        assert_eq!(cache.pending_count("t"), 5);
    }

    #[test]
    fn test_failed_batch_rolls_back_and_is_discarded() {
        let (backend, cache) = setup(CacheConfig::test_config());
        let failures = cache.subscribe_failures();

        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();
        cache.queue_insert("t", Row::new().set("no_such_column", 1)).unwrap();

        let err = cache.flush_table("t").unwrap_err();
        assert!(matches!(
            err,
            StorageError::Storage {
                operation: OperationKind::Flush,
                ..
            }
        ));
        assert_eq!(count_rows(&backend, "t"), 0);
        assert_eq!(cache.pending_count("t"), 0);

        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.table, "t");
        assert_eq!(failure.discarded, 2);
    }

    #[test]
    fn test_flush_all_attempts_every_table() {
        let (backend, cache) = setup(CacheConfig::test_config());

        cache.queue_insert("missing", Row::new().set("id", 1)).unwrap();
        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();

        assert!(cache.flush_all().is_err());
        assert_eq!(count_rows(&backend, "t"), 1);
        assert!(cache.pending_tables().is_empty());
    }

    #[test]
    fn test_periodic_flush() {
        let config = CacheConfig {
            flush_interval: Duration::from_millis(10),
            ..CacheConfig::test_config()
        };
        let (backend, cache) = setup(config);
        cache.start().unwrap();
        assert!(cache.is_running());

        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();

        let start = Instant::now();
        while count_rows(&backend, "t") == 0 && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count_rows(&backend, "t"), 1);

        cache.shutdown().unwrap();
        assert!(!cache.is_running());
    }

    #[test]
    fn test_shutdown_drains_and_rejects_new_work() {
        let (backend, cache) = setup(CacheConfig::test_config());
        cache.start().unwrap();

        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();
        cache.queue_insert("t", Row::new().set("id", 2)).unwrap();
        cache.shutdown().unwrap();

        assert_eq!(count_rows(&backend, "t"), 2);
        assert!(matches!(
            cache.queue_insert("t", Row::new().set("id", 3)),
            Err(StorageError::Closed)
        ));
        // second shutdown is a no-op
        cache.shutdown().unwrap();
    }

    #[test]
    fn test_acknowledged_enqueues_are_drained_by_shutdown() {
        for _ in 0..50 {
            let config = CacheConfig {
                batch_size: 7,
                ..CacheConfig::test_config()
            };
            let (backend, cache) = setup(config);
            let start = Arc::new(Barrier::new(5));

            let writers: Vec<_> = (0..4i64)
                .map(|w| {
                    let cache = Arc::clone(&cache);
                    let start = Arc::clone(&start);
                    thread::spawn(move || {
                        start.wait();
                        let mut acknowledged = 0;
                        for i in 0..2_000 {
                            match cache.queue_insert("t", Row::new().set("id", w * 100_000 + i)) {
                                Ok(()) => acknowledged += 1,
                                Err(StorageError::Closed) => break,
                                Err(e) => panic!("unexpected enqueue error: {e}"),
                            }
                        }
                        acknowledged
                    })
                })
                .collect();

            start.wait();
            cache.shutdown().unwrap();
            let acknowledged: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();

            assert_eq!(cache.pending_count("t"), 0);
            assert_eq!(count_rows(&backend, "t"), acknowledged);
        }
    }

    #[test]
    fn test_shutdown_drains_when_scheduler_is_stuck() {
        let config = CacheConfig {
            flush_interval: Duration::from_millis(1),
            shutdown_timeout: Duration::from_millis(20),
            ..CacheConfig::test_config()
        };
        let (backend, cache) = setup(config);

        // Hold the connection so the first tick blocks inside its flush.
        let (held_tx, held_rx) = mpsc::channel();
        let holder = {
            let backend = Arc::clone(&backend);
            thread::spawn(move || {
                backend
                    .with_connection(|_| {
                        held_tx.send(()).unwrap();
                        thread::sleep(Duration::from_millis(200));
                        Ok(())
                    })
                    .unwrap();
            })
        };
        held_rx.recv().unwrap();

        cache.start().unwrap();
        cache.queue_insert("t", Row::new().set("id", 1)).unwrap();
        cache.queue_insert("t", Row::new().set("id", 2)).unwrap();
        thread::sleep(Duration::from_millis(30));

        cache.shutdown().unwrap();
        holder.join().unwrap();

        assert!(!cache.is_running());
        assert_eq!(cache.pending_count("t"), 0);
        assert_eq!(count_rows(&backend, "t"), 2);
    }

    #[test]
    fn test_rejects_empty_predicate_and_row() {
        let (_backend, cache) = setup(CacheConfig::test_config());

        assert!(matches!(
            cache.queue_delete("t", Predicate::all()),
            Err(StorageError::InvalidOperation(_))
        ));
        assert!(matches!(
            cache.queue_insert("t", Row::new()),
            Err(StorageError::InvalidOperation(_))
        ));
        assert_eq!(cache.pending_count("t"), 0);
    }
}
