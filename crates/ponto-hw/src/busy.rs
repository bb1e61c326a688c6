//! Single-holder busy flag with scoped release.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutual-exclusion flag for "at most one operation in flight".
///
/// Acquisition is non-blocking: a second caller gets `None` rather than
/// waiting. The flag is released when the returned guard drops, which
/// covers early returns, `?` propagation, panics, and a dropped future.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    held: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                held: Arc::clone(&self.held),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Holds a [`BusyFlag`] until dropped.
#[derive(Debug)]
#[must_use = "the flag is released as soon as the guard is dropped"]
pub struct BusyGuard {
    held: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
