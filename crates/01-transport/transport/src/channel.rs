//! Edge contract shared by in-process buffers and serialized transports.
//!
//! The runtime only ever holds `Arc<dyn Channel<T>>`, so an edge backed by a
//! different process or machine plugs in as long as it honours the same
//! push/pop/close semantics as [`Buffer`].

use std::sync::Arc;

use crate::buffer::Buffer;
use crate::cancel::CancelToken;
use crate::config::BufferConfig;
use crate::error::TransportResult;
use crate::metrics::{PortMetricsSnapshot, PushOutcome};
use crate::wait::Doorbell;

pub trait Channel<T>: Send + Sync {
    /// Pushes following the edge's overflow policy, suspending under `block`
    /// until space frees up, the edge closes, or `cancel` fires.
    fn push_cancellable(&self, item: T, cancel: &CancelToken) -> TransportResult<PushOutcome>;

    /// Pushes without suspending.
    fn try_push(&self, item: T) -> TransportResult<PushOutcome>;

    /// Pops the oldest pending item without suspending.
    fn try_pop(&self) -> Option<T>;

    /// Idempotently marks end of stream and wakes suspended callers.
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closed and nothing left to pop.
    fn is_drained(&self) -> bool {
        self.is_closed() && self.is_empty()
    }

    fn config(&self) -> BufferConfig;

    fn metrics(&self) -> PortMetricsSnapshot;

    /// Doorbell rung whenever an item arrives or the edge closes.
    fn consumer_bell(&self) -> Arc<Doorbell>;
}

impl<T: Send> Channel<T> for Buffer<T> {
    fn push_cancellable(&self, item: T, cancel: &CancelToken) -> TransportResult<PushOutcome> {
        Buffer::push_cancellable(self, item, cancel)
    }

    fn try_push(&self, item: T) -> TransportResult<PushOutcome> {
        Buffer::try_push(self, item)
    }

    fn try_pop(&self) -> Option<T> {
        Buffer::try_pop(self)
    }

    fn close(&self) {
        Buffer::close(self)
    }

    fn is_closed(&self) -> bool {
        Buffer::is_closed(self)
    }

    fn len(&self) -> usize {
        Buffer::len(self)
    }

    fn config(&self) -> BufferConfig {
        Buffer::config(self)
    }

    fn metrics(&self) -> PortMetricsSnapshot {
        Buffer::metrics(self)
    }

    fn consumer_bell(&self) -> Arc<Doorbell> {
        Arc::clone(self.data_bell())
    }
}
