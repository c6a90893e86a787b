//! The single SQLite connection behind every statement.
//!
//! There is exactly one connection, not a pool: flushes and immediate writes
//! take turns on it. Access goes through [`Backend::with_connection`], which
//! hands out `&mut Connection` under a mutex, so opening a transaction (and
//! the autocommit toggling that comes with it) can only ever happen on one
//! thread at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::error::{Result, StorageError};

/// Apply the fixed durability settings.
///
/// WAL journaling, `synchronous=NORMAL`, foreign keys on, temp storage in
/// memory. These are not configurable.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(journal_mode = %mode, "Applied journal mode");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

/// Owner of the store connection.
#[derive(Debug)]
pub struct Backend {
    /// Location of the database file; `None` for in-memory stores.
    path: Option<PathBuf>,
    conn: Mutex<Option<Connection>>,
}

impl Backend {
    /// Open or create the database file at `path`.
    ///
    /// Missing parent directories are created. Failing here is fatal for the
    /// embedding host: nothing works without the store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Initialization`] if the directory, the file or
    /// the pragmas cannot be set up.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::initialization(parent, e))?;
        }

        let conn = Connection::open(&path).map_err(|e| StorageError::initialization(&path, e))?;
        apply_pragmas(&conn).map_err(|e| StorageError::initialization(&path, e))?;

        tracing::info!(path = %path.display(), "SQLite store opened");

        Ok(Self {
            path: Some(path),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open a private in-memory store with the same settings.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::initialization(":memory:", e))?;
        apply_pragmas(&conn).map_err(|e| StorageError::initialization(":memory:", e))?;

        Ok(Self {
            path: None,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Path of the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] after [`Backend::shutdown`], otherwise
    /// whatever `f` returns.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }

    /// Close the connection. Safe to call more than once.
    ///
    /// Close errors are logged, never returned.
    pub fn shutdown(&self) {
        let Some(conn) = self.lock().take() else {
            return;
        };

        match conn.close() {
            Ok(()) => tracing::info!("SQLite store closed"),
            Err((_conn, e)) => tracing::error!(error = %e, "Error closing SQLite connection"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic inside a statement closure leaves the connection usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
