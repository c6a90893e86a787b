//! Public operation surface and host lifecycle.
//!
//! The host drives three signals, in this order and once each:
//! 1. [`StorageManager::initialize`] opens the store and starts the flush
//!    thread. Operations are still refused.
//! 2. [`StorageManager::mark_ready`] lets traffic through.
//! 3. [`StorageManager::shutdown`] refuses new traffic, drains the cache and
//!    closes the store.
//!
//! Refused calls are logged by the [`AccessGuard`] and return an empty
//! result instead of an error.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::cache::{CacheConfig, FlushFailure, WriteCache};
use crate::config::Config;
use crate::error::{OperationKind, Result, StorageError};
use crate::guard::{AccessGuard, HostRole};
use crate::observability::metrics;
use crate::storage::{Backend, TableExecutor, WriteMode};
use crate::types::{Predicate, Row, TableSchema};

struct Inner {
    backend: Arc<Backend>,
    cache: Arc<WriteCache>,
    executor: TableExecutor,
    guard: AccessGuard,
}

/// Handle to an initialized store. Cheap to clone and share across threads.
#[derive(Clone)]
pub struct StorageManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("path", &self.inner.backend.path())
            .field("role", &self.inner.guard.role())
            .field("ready", &self.inner.guard.is_ready())
            .finish()
    }
}

impl StorageManager {
    /// Handle the host's initialize signal.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Initialization`] if the store cannot be opened
    /// or the flush thread cannot be started. The host should abort startup.
    pub fn initialize(config: &Config, role: HostRole) -> Result<Self> {
        metrics::init_metrics();
        let backend = Arc::new(Backend::open(config.database_path())?);
        Self::with_backend(backend, config.cache_config(), role)
    }

    /// Initialize on top of an already opened backend.
    pub fn with_backend(backend: Arc<Backend>, cache_config: CacheConfig, role: HostRole) -> Result<Self> {
        let cache = Arc::new(WriteCache::new(Arc::clone(&backend), cache_config));
        if let Err(e) = cache.start() {
            let path = backend.path().map_or_else(|| PathBuf::from(":memory:"), Path::to_path_buf);
            backend.shutdown();
            return Err(StorageError::initialization(path, e));
        }

        let executor = TableExecutor::new(Arc::clone(&backend), Arc::clone(&cache));
        tracing::info!(?role, "Storage manager initialized with write-behind cache");

        Ok(Self {
            inner: Arc::new(Inner {
                backend,
                cache,
                executor,
                guard: AccessGuard::new(role),
            }),
        })
    }

    /// Handle the host's ready signal.
    pub fn mark_ready(&self) {
        if self.inner.guard.mark_ready() {
            tracing::info!("Storage manager ready");
        } else {
            tracing::warn!("Ready signal ignored: storage manager is not starting");
        }
    }

    /// Handle the host's stopping signal.
    ///
    /// Every staged write is flushed before the store closes. Calling it
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the error of the final flush, if any; the store is closed
    /// regardless.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.guard.mark_stopped();
        let result = self.inner.cache.shutdown();
        if let Err(e) = &result {
            tracing::error!(error = %e, "Final flush failed during shutdown");
        }
        self.inner.backend.shutdown();
        result
    }

    pub fn is_ready(&self) -> bool {
        self.inner.guard.is_ready()
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.inner.backend.path()
    }

    /// Create the table if it does not exist.
    pub fn register_table(&self, schema: &TableSchema) -> Result<()> {
        if !self.admitted(OperationKind::CreateTable) {
            return Ok(());
        }
        self.inner.executor.create_table(schema)
    }

    /// Stage an insert-or-replace; it reaches the store on the next flush.
    pub fn insert(&self, table: &str, row: Row) -> Result<()> {
        if !self.admitted(OperationKind::Insert) {
            return Ok(());
        }
        self.inner.executor.insert(table, row, WriteMode::Deferred)
    }

    /// Insert-or-replace and commit before returning.
    pub fn insert_immediate(&self, table: &str, row: Row) -> Result<()> {
        if !self.admitted(OperationKind::Insert) {
            return Ok(());
        }
        self.inner.executor.insert(table, row, WriteMode::Immediate)
    }

    /// Rows matching `predicate`, including writes still staged in the cache.
    pub fn select(&self, table: &str, predicate: &Predicate) -> Result<Vec<Row>> {
        if !self.admitted(OperationKind::Select) {
            return Ok(Vec::new());
        }
        self.inner.executor.select(table, predicate)
    }

    /// Stage a delete. `predicate` must not be empty.
    pub fn delete(&self, table: &str, predicate: Predicate) -> Result<()> {
        if !self.admitted(OperationKind::Delete) {
            return Ok(());
        }
        self.inner.executor.delete(table, predicate, WriteMode::Deferred)
    }

    /// Delete and commit before returning. `predicate` must not be empty.
    pub fn delete_immediate(&self, table: &str, predicate: Predicate) -> Result<()> {
        if !self.admitted(OperationKind::Delete) {
            return Ok(());
        }
        self.inner.executor.delete(table, predicate, WriteMode::Immediate)
    }

    /// Flush one table's staged writes. Returns the number applied.
    pub fn flush(&self, table: &str) -> Result<usize> {
        if !self.admitted(OperationKind::Flush) {
            return Ok(0);
        }
        self.inner.cache.flush_table(table)
    }

    /// Flush every table's staged writes.
    pub fn flush_all(&self) -> Result<()> {
        if !self.admitted(OperationKind::Flush) {
            return Ok(());
        }
        self.inner.cache.flush_all()
    }

    /// Receive a notification for every batch that fails to commit.
    pub fn subscribe_flush_failures(&self) -> Receiver<FlushFailure> {
        self.inner.cache.subscribe_failures()
    }

    pub fn pending_count(&self, table: &str) -> usize {
        self.inner.cache.pending_count(table)
    }

    pub fn pending_tables(&self) -> Vec<String> {
        self.inner.cache.pending_tables()
    }

    fn admitted(&self, operation: OperationKind) -> bool {
        self.inner.guard.admit(operation).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn manager(role: HostRole) -> StorageManager {
        let backend = Arc::new(Backend::open_in_memory().unwrap());
        StorageManager::with_backend(backend, CacheConfig::test_config(), role).unwrap()
    }

    fn schema() -> TableSchema {
        TableSchema::builder("kv")
            .not_null_column("k", ColumnType::Text)
            .column("v", ColumnType::Integer)
            .primary_key(["k"])
            .build()
    }

    #[test]
    fn test_calls_before_ready_are_noops() {
        let manager = manager(HostRole::Authoritative);

        manager.register_table(&schema()).unwrap();
        manager.insert("kv", Row::new().set("k", "a")).unwrap();
        assert!(manager.select("kv", &Predicate::all()).unwrap().is_empty());
        assert_eq!(manager.pending_count("kv"), 0);

        manager.mark_ready();
        // The table was never created.
        assert!(manager.select("kv", &Predicate::all()).is_err());
    }

    #[test]
    fn test_inert_host_never_touches_store() {
        let manager = manager(HostRole::Inert);
        manager.mark_ready();

        manager.register_table(&schema()).unwrap();
        manager.insert("kv", Row::new().set("k", "a")).unwrap();
        manager.delete("kv", Predicate::all()).unwrap();
        assert!(manager.select("kv", &Predicate::all()).unwrap().is_empty());
        assert_eq!(manager.pending_count("kv"), 0);
    }

    #[test]
    fn test_ready_manager_round_trip() {
        let manager = manager(HostRole::Authoritative);
        manager.mark_ready();
        manager.register_table(&schema()).unwrap();

        manager.insert("kv", Row::new().set("k", "a").set("v", 1)).unwrap();
        manager.insert_immediate("kv", Row::new().set("k", "b").set("v", 2)).unwrap();
        manager.delete("kv", Predicate::new().eq("k", "a")).unwrap();

        let rows = manager.select("kv", &Predicate::all()).unwrap();
        assert_eq!(rows, vec![Row::new().set("k", "b").set("v", 2)]);
    }

    #[test]
    fn test_calls_after_shutdown_are_noops() {
        let manager = manager(HostRole::Authoritative);
        manager.mark_ready();
        manager.register_table(&schema()).unwrap();
        manager.shutdown().unwrap();

        manager.insert("kv", Row::new().set("k", "a")).unwrap();
        assert!(manager.select("kv", &Predicate::all()).unwrap().is_empty());
        assert_eq!(manager.flush("kv").unwrap(), 0);
        manager.shutdown().unwrap();
    }
}
