//! Per-session run exclusivity and cancellation

use crate::error::{AppError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capability deciding whether a new run may start for a session
pub trait RunGuard: Send + Sync {
    /// Claim the session; `false` when a run is already active
    fn try_begin(&self) -> bool;

    /// Release the session
    fn end(&self);

    fn is_active(&self) -> bool;
}

/// In-process session state backed by an atomic flag
#[derive(Debug, Default)]
pub struct SessionState {
    active: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunGuard for SessionState {
    fn try_begin(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn end(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Holds a claimed session and releases it when dropped, including when
/// the run future is abandoned. The run's cancel flag is cleared on release,
/// so a cancel raised at any point while the run is active still applies.
pub struct ActiveRun<'a> {
    guard: &'a dyn RunGuard,
    cancel: &'a CancelHandle,
}

impl<'a> ActiveRun<'a> {
    pub fn acquire(guard: &'a dyn RunGuard, cancel: &'a CancelHandle) -> Result<Self> {
        if guard.try_begin() {
            Ok(Self { guard, cancel })
        } else {
            Err(AppError::TestAlreadyInProgress)
        }
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.cancel.reset();
        self.guard.end();
    }
}

/// Cloneable cancellation flag, usable from any task or thread
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// `Err(Cancelled)` once `cancel` has been called
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}
