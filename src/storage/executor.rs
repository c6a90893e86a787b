//! Table operations: schema definition, writes and reads.
//!
//! Writes take either the deferred path (staged in the [`WriteCache`]) or the
//! immediate path (executed on the connection before returning). Reads always
//! flush the target table first, so they see every write made before them.

use std::sync::Arc;

use crate::cache::WriteCache;
use crate::error::{OperationKind, Result, StorageError};
use crate::storage::{sql, Backend};
use crate::types::{Predicate, Row, TableSchema};

/// How a mutation reaches the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Stage in the write-behind cache and return immediately.
    #[default]
    Deferred,
    /// Execute and commit before returning.
    Immediate,
}

/// Translates table operations into statements.
#[derive(Debug, Clone)]
pub struct TableExecutor {
    backend: Arc<Backend>,
    cache: Arc<WriteCache>,
}

impl TableExecutor {
    pub fn new(backend: Arc<Backend>, cache: Arc<WriteCache>) -> Self {
        Self { backend, cache }
    }

    /// Create the table if it does not exist yet.
    ///
    /// An existing table is left untouched, even if its definition differs.
    pub fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let statement = sql::create_table_sql(schema);
        self.backend.with_connection(|conn| {
            conn.execute(&statement, [])
                .map_err(|e| StorageError::storage(schema.name(), OperationKind::CreateTable, e))?;
            tracing::debug!(table = schema.name(), sql = %statement, "Executed table definition");
            Ok(())
        })
    }

    /// Insert or replace a row.
    ///
    /// A row sharing the primary key of an existing row replaces it whole.
    pub fn insert(&self, table: &str, row: Row, mode: WriteMode) -> Result<()> {
        match mode {
            WriteMode::Deferred => self.cache.queue_insert(table, row),
            WriteMode::Immediate => {
                if row.is_empty() {
                    return Err(StorageError::InvalidOperation(format!(
                        "insert into `{table}` has no columns"
                    )));
                }
                // Older staged writes must not land on top of this one later.
                self.cache.flush_table(table)?;
                self.backend.with_connection(|conn| {
                    sql::execute_insert(conn, table, &row)
                        .map_err(|e| StorageError::storage(table, OperationKind::Insert, e))?;
                    Ok(())
                })
            }
        }
    }

    /// Return every row matching `predicate` (all rows if empty).
    pub fn select(&self, table: &str, predicate: &Predicate) -> Result<Vec<Row>> {
        self.cache.flush_table(table)?;
        self.backend.with_connection(|conn| {
            sql::query_rows(conn, table, predicate)
                .map_err(|e| StorageError::storage(table, OperationKind::Select, e))
        })
    }

    /// Delete rows matching `predicate`.
    ///
    /// An empty predicate is refused before anything is staged or executed.
    pub fn delete(&self, table: &str, predicate: Predicate, mode: WriteMode) -> Result<()> {
        if predicate.is_empty() {
            return Err(StorageError::InvalidOperation(format!(
                "delete from `{table}` without a predicate"
            )));
        }

        match mode {
            WriteMode::Deferred => self.cache.queue_delete(table, predicate),
            WriteMode::Immediate => {
                self.cache.flush_table(table)?;
                self.backend.with_connection(|conn| {
                    let removed = sql::execute_delete(conn, table, &predicate)
                        .map_err(|e| StorageError::storage(table, OperationKind::Delete, e))?;
                    tracing::debug!(table, removed, "Deleted rows");
                    Ok(())
                })
            }
        }
    }
}
