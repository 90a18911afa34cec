//! Doorbell words used to park edge producers and consumers.
//!
//! A doorbell is a single `AtomicU32` sequence. Waiters snapshot the sequence,
//! re-check their condition, then park on the word through the `atomic-wait`
//! crate (futex-backed where available). Every state change that could unblock
//! a waiter bumps the sequence and wakes all parked threads. Waiters always
//! re-check after waking, so spurious wakeups are harmless and a ring that
//! lands between the snapshot and the park is never lost.

use std::sync::atomic::{AtomicU32, Ordering};

/// Result of attempting to park on a doorbell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// The caller parked and was woken (possibly spuriously).
    Ok,
    /// The doorbell already rang past the snapshot; the caller did not park.
    NotEqual,
}

/// Sequence word that several edges may share to wake one parked thread.
#[derive(Debug, Default)]
pub struct Doorbell {
    seq: AtomicU32,
}

impl Doorbell {
    /// Creates a doorbell with sequence zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current sequence; pass it to [`Doorbell::wait`].
    #[inline]
    pub fn seq(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    /// Bumps the sequence and wakes every parked waiter.
    #[inline]
    pub fn ring(&self) {
        self.seq.fetch_add(1, Ordering::AcqRel);
        atomic_wait::wake_all(&self.seq as *const AtomicU32);
    }

    /// Parks until the sequence differs from `seen` or a wakeup occurs.
    #[inline]
    pub fn wait(&self, seen: u32) -> WaitResult {
        if self.seq() != seen {
            return WaitResult::NotEqual;
        }
        atomic_wait::wait(&self.seq, seen);
        WaitResult::Ok
    }
}
