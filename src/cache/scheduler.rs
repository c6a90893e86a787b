//! Background thread that runs a tick at a fixed interval.

use std::io;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Name of the flush thread, visible in debuggers and thread-id logs.
pub const THREAD_NAME: &str = "storage-write-cache";

/// Handle to a running periodic thread.
#[derive(Debug)]
pub struct Scheduler {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the thread. `tick` runs once per `interval` until it breaks or
    /// the scheduler is stopped.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if tick().is_break() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            stop_tx,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Ask the thread to stop and wait up to `timeout` for it.
    ///
    /// Returns false if the thread was still busy and got abandoned; it exits
    /// on its own once the current tick returns.
    pub fn stop(mut self, timeout: Duration) -> bool {
        let _ = self.stop_tx.send(());

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        tracing::error!("Write cache scheduler thread panicked");
                    }
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Write cache scheduler did not stop in time, abandoning it"
                );
                false
            }
        }
    }
}
