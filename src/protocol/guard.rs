//! Re-entrancy guard.
//!
//! Every state-mutating operation holds the guard for its full duration.
//! The returned token releases it on drop, so success, validation failure
//! and collaborator failure all leave the guard open again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::warn;

use crate::error::{Error, Result};

/// Operation-in-progress flag for one engine
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
    rejected: AtomicU64,
}

impl ReentrancyGuard {
    /// Create an open guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded section, failing if an operation is already in progress
    pub fn enter(&self) -> Result<GuardToken<'_>> {
        if self
            .entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Re-entrant call rejected");
            return Err(Error::ReentrantCall);
        }
        Ok(GuardToken { guard: self })
    }

    /// Check if an operation is in progress
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }

    /// Number of calls rejected so far
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Proof of holding the guard; releases it when dropped
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}
