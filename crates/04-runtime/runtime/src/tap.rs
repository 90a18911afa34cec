//! Read-only stream of every emitted message, for recorders.
//!
//! Taps never apply backpressure: a record that does not fit into a tap's
//! channel is counted and discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use iu::{ModuleId, UpdateMessage};
use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;

use crate::summary::{summarize, EntrySummary};

/// One emitted message as seen by a tap.
#[derive(Clone, Debug)]
pub struct TapRecord {
    /// Network-wide emission sequence number.
    pub seq: u64,
    pub producer: ModuleId,
    /// Time since the tap hub was created.
    pub at: Duration,
    pub message: UpdateMessage,
}

impl TapRecord {
    pub fn summary(&self) -> TapSummary {
        TapSummary {
            seq: self.seq,
            producer: self.producer.clone(),
            at_micros: u64::try_from(self.at.as_micros()).unwrap_or(u64::MAX),
            entries: summarize(&self.message),
        }
    }
}

/// Serializable form of a [`TapRecord`]; one NDJSON line per record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TapSummary {
    pub seq: u64,
    pub producer: ModuleId,
    pub at_micros: u64,
    pub entries: Vec<EntrySummary>,
}

#[derive(Debug)]
pub struct TapHub {
    started: Instant,
    seq: AtomicU64,
    dropped: AtomicU64,
    taps: RwLock<Vec<Sender<TapRecord>>>,
}

impl Default for TapHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TapHub {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            taps: RwLock::new(Vec::new()),
        }
    }

    /// Opens a tap holding at most `capacity` undelivered records.
    pub fn subscribe(&self, capacity: usize) -> Receiver<TapRecord> {
        let (tx, rx) = bounded(capacity.max(1));
        self.taps.write().push(tx);
        rx
    }

    pub fn has_taps(&self) -> bool {
        !self.taps.read().is_empty()
    }

    /// Records discarded because a tap was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn offer(&self, producer: &ModuleId, message: &UpdateMessage) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut closed: SmallVec<[Sender<TapRecord>; 2]> = SmallVec::new();
        {
            let taps = self.taps.read();
            if taps.is_empty() {
                return;
            }
            let record = TapRecord {
                seq,
                producer: producer.clone(),
                at: self.started.elapsed(),
                message: message.clone(),
            };
            for tap in taps.iter() {
                match tap.try_send(record.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => closed.push(tap.clone()),
                }
            }
        }
        if !closed.is_empty() {
            self.taps
                .write()
                .retain(|tap| !closed.iter().any(|gone| gone.same_channel(tap)));
        }
    }
}
