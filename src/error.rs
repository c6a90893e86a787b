//! Error types for the storage manager.
//!
//! Every public operation returns [`Result`]. Statement failures carry the
//! table and operation they happened in so deferred failures stay
//! attributable once they surface.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`StorageError`].
pub type Result<T> = std::result::Result<T, StorageError>;

/// Kind of operation a statement was executed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    CreateTable,
    Insert,
    Select,
    Delete,
    Flush,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateTable => "create table",
            Self::Insert => "insert",
            Self::Select => "select",
            Self::Delete => "delete",
            Self::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// Why the access guard turned a call away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// The host has not signalled readiness yet.
    TooEarly,
    /// The host role is not allowed to touch the store.
    WrongContext,
    /// The host already signalled shutdown.
    ShutDown,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::TooEarly => "called before the host signalled readiness",
            Self::WrongContext => "called from a non-authoritative host",
            Self::ShutDown => "called after shutdown",
        };
        f.write_str(reason)
    }
}

/// Unified error type for storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    // -------------------------------------------------------------------------
    // Startup
    // -------------------------------------------------------------------------
    #[error("failed to initialize store at {}: {source}", path.display())]
    Initialization {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // -------------------------------------------------------------------------
    // Statement execution
    // -------------------------------------------------------------------------
    #[error("{operation} on table `{table}` failed: {source}")]
    Storage {
        table: String,
        operation: OperationKind,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Caller errors
    // -------------------------------------------------------------------------
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("storage manager is not ready: {0}")]
    NotReady(NotReadyReason),
}

impl StorageError {
    /// Wrap a statement error with the table and operation it belongs to.
    pub(crate) fn storage(
        table: impl Into<String>,
        operation: OperationKind,
        source: rusqlite::Error,
    ) -> Self {
        Self::Storage {
            table: table.into(),
            operation,
            source,
        }
    }

    pub(crate) fn initialization(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Initialization {
            path: path.into(),
            source: source.into(),
        }
    }
}
