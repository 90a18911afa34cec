//! Per-edge configuration supplied when a network is wired.

use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Default number of pending messages an edge holds.
pub const DEFAULT_CAPACITY: usize = 64;

/// What an edge does when a push finds it at capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Suspend the producer until the consumer pops.
    #[default]
    Block,
    /// Evict the oldest pending message to make room.
    ///
    /// Advisory only: an evicted REVOKE leaves the consumer believing a
    /// revoked unit is still active. Do not use on edges that carry
    /// revocations the consumer depends on.
    DropOldest,
    /// Reject the push with [`TransportError::BufferFull`].
    Error,
}

impl OverflowPolicy {
    /// Returns `true` for policies that can silently lose updates.
    pub fn is_lossy(self) -> bool {
        matches!(self, OverflowPolicy::DropOldest)
    }
}

/// Capacity and overflow policy for one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub capacity: usize,
    #[serde(alias = "overflow_policy")]
    pub overflow: OverflowPolicy,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl BufferConfig {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self { capacity, overflow }
    }

    pub fn blocking(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::Block)
    }

    pub fn validate(&self) -> TransportResult<()> {
        if self.capacity == 0 {
            return Err(TransportError::InvalidCapacity {
                requested: self.capacity,
                minimum: 1,
            });
        }
        Ok(())
    }
}
