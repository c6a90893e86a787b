//! Failure notifications for deferred writes.
//!
//! A deferred insert or delete returns before it reaches the store, so its
//! caller never sees the flush that eventually fails. Subscribers registered
//! here get one [`FlushFailure`] per failed batch, whoever triggered it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// A batch that failed to commit and was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushFailure {
    pub table: String,
    /// Number of operations rolled back and dropped
    pub discarded: usize,
    pub error: String,
}

/// Registry of failure subscribers.
#[derive(Debug, Default)]
pub struct FailureListeners {
    senders: Mutex<Vec<Sender<FlushFailure>>>,
}

impl FailureListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    ///
    /// Dropping the receiver unregisters it on the next notification.
    pub fn subscribe(&self) -> Receiver<FlushFailure> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        rx
    }

    /// Send `failure` to every live subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn notify(&self, failure: &FlushFailure) -> usize {
        let mut senders = self.lock();
        senders.retain(|tx| tx.send(failure.clone()).is_ok());
        senders.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<FlushFailure>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
