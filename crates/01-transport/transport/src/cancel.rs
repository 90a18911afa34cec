//! Cooperative cancellation for blocked pushes and pops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::wait::Doorbell;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    bells: Mutex<SmallVec<[Arc<Doorbell>; 4]>>,
}

/// Shared flag observed by blocking edge operations.
///
/// A blocking operation registers the doorbell it is about to park on, checks
/// the flag, then parks. [`CancelToken::cancel`] sets the flag and rings every
/// registered doorbell, so a parked caller returns promptly.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`CancelToken::cancel`] has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Sets the flag and wakes every registered doorbell. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let bells = self.inner.bells.lock().clone();
        for bell in bells.iter() {
            bell.ring();
        }
    }

    /// Registers a doorbell to ring on cancellation. Duplicates are ignored.
    pub fn watch(&self, bell: &Arc<Doorbell>) {
        let mut bells = self.inner.bells.lock();
        if !bells.iter().any(|known| Arc::ptr_eq(known, bell)) {
            bells.push(Arc::clone(bell));
        }
    }
}
