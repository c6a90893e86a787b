//! Test utilities for storage manager integration tests.
//!
//! Provides:
//! - A temporary data directory fixture
//! - Ready-to-use managers with a flush timer that never fires mid-test
//! - Schema helpers

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use storage_manager::observability::tracing::init_test_tracing;
use storage_manager::{ColumnType, Config, HostRole, StorageManager, TableSchema};
use tempfile::TempDir;

/// Test fixture that manages a temporary data directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory holding the database
    pub temp_dir: TempDir,
    /// Configuration rooted at the temporary directory
    pub config: Config,
}

impl TestFixture {
    /// Create a fixture whose periodic flush is effectively disabled.
    pub fn new() -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = Config {
            flush_interval_ms: 60 * 60 * 1000,
            shutdown_timeout_ms: 1000,
            ..Config::with_data_dir(temp_dir.path())
        };
        Self { temp_dir, config }
    }

    /// Create a fixture with a custom flush interval.
    pub fn with_flush_interval(interval: Duration) -> Self {
        let mut fixture = Self::new();
        fixture.config.flush_interval_ms = interval.as_millis() as u64;
        fixture
    }

    pub fn db_path(&self) -> PathBuf {
        self.config.database_path()
    }

    /// Initialize a manager and signal readiness.
    pub fn start(&self) -> StorageManager {
        let manager = StorageManager::initialize(&self.config, HostRole::Authoritative)
            .expect("failed to initialize storage manager");
        manager.mark_ready();
        manager
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `players(id INTEGER NOT NULL, name TEXT)`, primary key `id`.
pub fn players_schema() -> TableSchema {
    TableSchema::builder("players")
        .not_null_column("id", ColumnType::Integer)
        .column("name", ColumnType::Text)
        .primary_key(["id"])
        .build()
}

/// `homes(owner TEXT NOT NULL, slot INTEGER NOT NULL, x REAL)`, key `(owner, slot)`.
pub fn homes_schema() -> TableSchema {
    TableSchema::builder("homes")
        .not_null_column("owner", ColumnType::Text)
        .not_null_column("slot", ColumnType::Integer)
        .column("x", ColumnType::Real)
        .primary_key(["owner", "slot"])
        .build()
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

/// Count rows committed to the file, bypassing the manager and its cache.
pub fn count_persisted(db_path: &std::path::Path, table: &str) -> i64 {
    let conn = rusqlite::Connection::open(db_path).expect("failed to open database");
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .expect("failed to count rows")
}
