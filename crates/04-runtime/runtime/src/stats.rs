use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct ModuleStats {
    steps: AtomicU64,
    received: AtomicU64,
    emitted: AtomicU64,
    dropped_entries: AtomicU64,
    errors: AtomicU64,
    errors_lost: AtomicU64,
}

impl ModuleStats {
    pub(crate) fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, entries: usize) {
        self.dropped_entries
            .fetch_add(entries as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, delivered: bool) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if !delivered {
            self.errors_lost.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> ModuleStatsSnapshot {
        ModuleStatsSnapshot {
            steps: self.steps.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped_entries: self.dropped_entries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            errors_lost: self.errors_lost.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a module's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModuleStatsSnapshot {
    /// Processing steps run, including source `produce` calls that emitted.
    pub steps: u64,
    /// Messages popped from inputs.
    pub received: u64,
    /// Non-empty messages handed to the fan-out.
    pub emitted: u64,
    /// Entries dropped by the input or output ledger.
    pub dropped_entries: u64,
    /// Errors reported on the error channel.
    pub errors: u64,
    /// Errors that did not fit into the error channel.
    pub errors_lost: u64,
}
