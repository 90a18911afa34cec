use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use serde::Serialize;

/// Outcome of a push that delivered its item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The item entered the edge untouched.
    Accepted,
    /// The item entered the edge after the oldest pending item was evicted.
    DroppedOldest,
}

#[derive(Debug, Default)]
pub(crate) struct PortMetrics {
    accepted: AtomicU32,
    dropped_oldest: AtomicU32,
    rejected_full: AtomicU32,
    popped: AtomicU32,
    high_water: AtomicUsize,
}

impl PortMetrics {
    pub(crate) fn record_push(&self, outcome: PushOutcome, depth: usize) {
        match outcome {
            PushOutcome::Accepted => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
            }
            PushOutcome::DroppedOldest => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                self.dropped_oldest.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.high_water.fetch_max(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pop(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PortMetricsSnapshot {
        PortMetricsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped_oldest: self.dropped_oldest.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            high_water: self.high_water.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of an edge's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PortMetricsSnapshot {
    pub accepted: u32,
    pub dropped_oldest: u32,
    pub rejected_full: u32,
    pub popped: u32,
    pub high_water: usize,
}
