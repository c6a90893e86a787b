//! Access guard in front of every public operation.
//!
//! Calls made before the host signals readiness, after it signals shutdown,
//! or from a host that is not the authoritative owner of the store are turned
//! away with a log line instead of an error the host would have to handle.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{NotReadyReason, OperationKind, Result, StorageError};

/// Capability of the embedding host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostRole {
    /// Owns the store; operations are allowed once ready.
    #[default]
    Authoritative,
    /// Must never touch the store (e.g. a client-side instance).
    Inert,
}

const STARTING: u8 = 0;
const READY: u8 = 1;
const STOPPED: u8 = 2;

/// Gate checked by every public operation.
#[derive(Debug)]
pub struct AccessGuard {
    role: HostRole,
    state: AtomicU8,
}

impl AccessGuard {
    /// Create a guard in the starting state.
    pub fn new(role: HostRole) -> Self {
        Self {
            role,
            state: AtomicU8::new(STARTING),
        }
    }

    pub fn role(&self) -> HostRole {
        self.role
    }

    /// Start accepting traffic.
    ///
    /// Returns false if the guard was not in the starting state.
    pub fn mark_ready(&self) -> bool {
        self.state
            .compare_exchange(STARTING, READY, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Stop accepting traffic for good.
    pub fn mark_stopped(&self) {
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::SeqCst) == READY
    }

    /// Check whether `operation` may proceed.
    ///
    /// Rejections are logged here; callers only decide what empty result to
    /// hand back.
    pub fn admit(&self, operation: OperationKind) -> Result<()> {
        let reason = match (self.role, self.state.load(Ordering::SeqCst)) {
            (HostRole::Inert, _) => NotReadyReason::WrongContext,
            (HostRole::Authoritative, READY) => return Ok(()),
            (HostRole::Authoritative, STARTING) => NotReadyReason::TooEarly,
            (HostRole::Authoritative, _) => NotReadyReason::ShutDown,
        };

        match reason {
            NotReadyReason::TooEarly => tracing::error!(
                %operation,
                "Storage manager is not ready yet; it was used during host initialization, \
                 which is too early. Wait until the host signals it is ready."
            ),
            NotReadyReason::WrongContext => tracing::warn!(
                %operation,
                "Storage manager isn't meant to be used here; only the authoritative host \
                 may access the store."
            ),
            NotReadyReason::ShutDown => tracing::warn!(
                %operation,
                "Storage manager was used after shutdown; the call was ignored."
            ),
        }
        Err(StorageError::NotReady(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(guard: &AccessGuard) -> Option<NotReadyReason> {
        match guard.admit(OperationKind::Select) {
            Ok(()) => None,
            Err(StorageError::NotReady(reason)) => Some(reason),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_before_ready() {
        let guard = AccessGuard::new(HostRole::Authoritative);
        assert_eq!(reason(&guard), Some(NotReadyReason::TooEarly));
    }

    #[test]
    fn test_admits_when_ready() {
        let guard = AccessGuard::new(HostRole::Authoritative);
        assert!(guard.mark_ready());
        assert!(guard.is_ready());
        assert_eq!(reason(&guard), None);
    }

    #[test]
    fn test_mark_ready_only_once() {
        let guard = AccessGuard::new(HostRole::Authoritative);
        assert!(guard.mark_ready());
        assert!(!guard.mark_ready());
    }

    #[test]
    fn test_inert_host_always_rejected() {
        let guard = AccessGuard::new(HostRole::Inert);
        assert_eq!(reason(&guard), Some(NotReadyReason::WrongContext));
        guard.mark_ready();
        assert_eq!(reason(&guard), Some(NotReadyReason::WrongContext));
    }

    #[test]
    fn test_rejects_after_stop() {
        let guard = AccessGuard::new(HostRole::Authoritative);
        guard.mark_ready();
        guard.mark_stopped();
        assert_eq!(reason(&guard), Some(NotReadyReason::ShutDown));
        assert!(!guard.mark_ready());
    }
}
