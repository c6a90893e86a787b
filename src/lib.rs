//! Storage Manager: embedded SQLite row storage with a write-behind cache.
//!
//! Callers register table schemas, insert rows, select and delete by
//! equality predicates. Inserts and deletes are staged in memory by default
//! and applied in batches: periodically, when a table's queue fills up, and
//! before any read of that table, so reads always see earlier writes.
//!
//! # Architecture
//!
//! - **One connection**: a single SQLite handle (WAL, `synchronous=NORMAL`)
//! - **Write-behind**: per-table queues flushed atomically in one transaction
//! - **Back-pressure**: an insert that fills its queue flushes synchronously
//! - **Guarded**: calls outside the host's ready window become no-ops
//!
//! # Modules
//!
//! - [`cache`]: Pending queues, flush scheduler, failure notifications
//! - [`config`]: CLI and environment configuration
//! - [`guard`]: Readiness and host-role gate
//! - [`manager`]: Public operations and host lifecycle
//! - [`observability`]: Tracing and metrics setup
//! - [`storage`]: SQLite backend, SQL rendering, table executor
//! - [`types`]: Values, rows, predicates, schemas
//!
//! # Example
//!
//! ```
//! use storage_manager::{ColumnType, Config, HostRole, Predicate, Row, StorageManager, TableSchema};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let manager = StorageManager::initialize(&Config::with_data_dir(dir.path()), HostRole::Authoritative)?;
//! manager.mark_ready();
//!
//! manager.register_table(
//!     &TableSchema::builder("players")
//!         .not_null_column("id", ColumnType::Integer)
//!         .column("name", ColumnType::Text)
//!         .primary_key(["id"])
//!         .build(),
//! )?;
//! manager.insert("players", Row::new().set("id", 1).set("name", "steve"))?;
//!
//! let rows = manager.select("players", &Predicate::new().eq("id", 1))?;
//! assert_eq!(rows.len(), 1);
//!
//! manager.shutdown()?;
//! # Ok::<(), storage_manager::StorageError>(())
//! ```

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // cache::CacheConfig is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::needless_raw_string_hashes  // r#""# is fine for SQL
)]

pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod manager;
pub mod observability;
pub mod storage;
pub mod types;

pub use cache::{CacheConfig, FlushFailure, WriteCache};
pub use config::Config;
pub use error::{NotReadyReason, OperationKind, Result, StorageError};
pub use guard::{AccessGuard, HostRole};
pub use manager::StorageManager;
pub use storage::{Backend, TableExecutor, WriteMode};
pub use types::{Column, ColumnType, Predicate, Row, TableSchema, Value};
