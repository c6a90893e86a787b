//! Per-table pending queues and cache cadence settings.

use std::time::Duration;

use crate::types::{Predicate, Row};

/// Configuration for the write-behind cache.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Queue length at which an insert flushes its table synchronously
    pub batch_size: usize,
    /// Period of the background flush of all tables
    pub flush_interval: Duration,
    /// How long shutdown waits for the scheduler thread before abandoning it
    pub shutdown_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_millis(5000),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Create a CacheConfig from application config values.
    pub fn from_config(batch_size: usize, flush_interval_ms: u64, shutdown_timeout_ms: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            flush_interval: Duration::from_millis(flush_interval_ms),
            shutdown_timeout: Duration::from_millis(shutdown_timeout_ms),
        }
    }

    /// Create a test config whose timer never fires during a test.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(1),
        }
    }
}

/// A mutation waiting to be flushed. The table is the queue's key.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation {
    Insert(Row),
    Delete(Predicate),
}

/// Ordered pending operations for one table.
///
/// Lives in the cache's map from the first enqueue until a flush removes it.
#[derive(Debug)]
pub struct PendingQueue {
    threshold: usize,
    ops: Vec<PendingOperation>,
}

impl PendingQueue {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            ops: Vec::new(),
        }
    }

    /// Append an operation.
    ///
    /// Returns true if the queue has reached the flush threshold.
    pub fn push(&mut self, op: PendingOperation) -> bool {
        self.ops.push(op);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.ops.len() >= self.threshold
    }

    /// Consume the queue, returning operations in enqueue order.
    pub fn into_operations(self) -> Vec<PendingOperation> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
