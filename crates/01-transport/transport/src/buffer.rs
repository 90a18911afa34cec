//! Bounded FIFO hand-off point between one producer and one consumer.
//!
//! The queue itself sits behind a `parking_lot` mutex; blocking is done on two
//! doorbells rather than a condition variable so that several buffers feeding
//! one consumer can share the consumer-side doorbell:
//!
//! * the *data* doorbell rings on every push and on close (wakes poppers),
//! * the *space* doorbell rings on every pop and on close (wakes pushers).
//!
//! Items pending when the buffer closes stay poppable; `pop` reports
//! [`Pop::Closed`] only once the buffer is both closed and empty.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::config::{BufferConfig, OverflowPolicy};
use crate::error::{TransportError, TransportResult};
use crate::metrics::{PortMetrics, PortMetricsSnapshot, PushOutcome};
use crate::wait::Doorbell;

/// Result of a blocking pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    /// The next item in FIFO order.
    Item(T),
    /// The edge is closed and fully drained (end of stream).
    Closed,
    /// The caller's cancellation token fired while waiting.
    Cancelled,
}

impl<T> Pop<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Pop::Item(item) => Some(item),
            Pop::Closed | Pop::Cancelled => None,
        }
    }
}

#[derive(Clone, Copy)]
enum PushWait<'a> {
    NonBlocking,
    Block,
    Cancellable(&'a CancelToken),
}

/// Bounded, thread-safe edge buffer.
pub struct Buffer<T> {
    config: BufferConfig,
    queue: Mutex<VecDeque<T>>,
    closed: AtomicBool,
    data_bell: Arc<Doorbell>,
    space_bell: Arc<Doorbell>,
    metrics: PortMetrics,
}

impl<T> Buffer<T> {
    /// Creates a buffer with its own consumer doorbell.
    pub fn new(config: BufferConfig) -> TransportResult<Self> {
        Self::with_doorbell(config, Arc::new(Doorbell::new()))
    }

    /// Creates a buffer that rings `data_bell` whenever an item arrives or the
    /// buffer closes. Share one doorbell across every input of a consumer.
    pub fn with_doorbell(config: BufferConfig, data_bell: Arc<Doorbell>) -> TransportResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            queue: Mutex::new(VecDeque::with_capacity(config.capacity)),
            closed: AtomicBool::new(false),
            data_bell,
            space_bell: Arc::new(Doorbell::new()),
            metrics: PortMetrics::default(),
        })
    }

    pub fn config(&self) -> BufferConfig {
        self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closed and nothing left to pop.
    pub fn is_drained(&self) -> bool {
        self.is_closed() && self.is_empty()
    }

    pub fn metrics(&self) -> PortMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn data_bell(&self) -> &Arc<Doorbell> {
        &self.data_bell
    }

    /// Pushes following the edge's overflow policy; `block` suspends until
    /// space frees up or the buffer closes.
    pub fn push(&self, item: T) -> TransportResult<PushOutcome> {
        self.push_inner(item, PushWait::Block)
    }

    /// Like [`Buffer::push`], but a `block` wait returns
    /// [`TransportError::Cancelled`] once `cancel` fires.
    pub fn push_cancellable(&self, item: T, cancel: &CancelToken) -> TransportResult<PushOutcome> {
        self.push_inner(item, PushWait::Cancellable(cancel))
    }

    /// Never suspends; a full `block` edge yields [`TransportError::WouldBlock`].
    pub fn try_push(&self, item: T) -> TransportResult<PushOutcome> {
        self.push_inner(item, PushWait::NonBlocking)
    }

    fn push_inner(&self, item: T, wait: PushWait<'_>) -> TransportResult<PushOutcome> {
        loop {
            let seen = self.space_bell.seq();
            {
                let mut queue = self.queue.lock();
                if self.is_closed() {
                    return Err(TransportError::Closed);
                }
                if queue.len() < self.config.capacity {
                    queue.push_back(item);
                    let depth = queue.len();
                    drop(queue);
                    return Ok(self.delivered(PushOutcome::Accepted, depth));
                }
                match self.config.overflow {
                    OverflowPolicy::DropOldest => {
                        let evicted = queue.pop_front();
                        queue.push_back(item);
                        let depth = queue.len();
                        drop(queue);
                        drop(evicted);
                        tracing::trace!(capacity = self.config.capacity, "edge evicted oldest");
                        return Ok(self.delivered(PushOutcome::DroppedOldest, depth));
                    }
                    OverflowPolicy::Error => {
                        self.metrics.record_rejected();
                        return Err(TransportError::BufferFull {
                            capacity: self.config.capacity,
                        });
                    }
                    OverflowPolicy::Block => {}
                }
            }

            match wait {
                PushWait::NonBlocking => {
                    return Err(TransportError::WouldBlock {
                        capacity: self.config.capacity,
                    });
                }
                PushWait::Block => {}
                PushWait::Cancellable(token) => {
                    token.watch(&self.space_bell);
                    if token.is_cancelled() {
                        return Err(TransportError::Cancelled);
                    }
                }
            }
            self.space_bell.wait(seen);
        }
    }

    fn delivered(&self, outcome: PushOutcome, depth: usize) -> PushOutcome {
        self.metrics.record_push(outcome, depth);
        self.data_bell.ring();
        outcome
    }

    /// Pops the oldest item without suspending.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.queue.lock().pop_front();
        if item.is_some() {
            self.metrics.record_pop();
            self.space_bell.ring();
        }
        item
    }

    /// Suspends until an item arrives or the buffer is closed and drained.
    pub fn pop(&self) -> Pop<T> {
        self.pop_inner(None)
    }

    /// Like [`Buffer::pop`], but returns [`Pop::Cancelled`] once `cancel` fires.
    pub fn pop_cancellable(&self, cancel: &CancelToken) -> Pop<T> {
        self.pop_inner(Some(cancel))
    }

    fn pop_inner(&self, cancel: Option<&CancelToken>) -> Pop<T> {
        loop {
            let seen = self.data_bell.seq();
            if let Some(item) = self.try_pop() {
                return Pop::Item(item);
            }
            if self.is_closed() {
                // A push may have landed between the empty check and the close.
                return match self.try_pop() {
                    Some(item) => Pop::Item(item),
                    None => Pop::Closed,
                };
            }
            if let Some(token) = cancel {
                token.watch(&self.data_bell);
                if token.is_cancelled() {
                    return Pop::Cancelled;
                }
            }
            self.data_bell.wait(seen);
        }
    }

    /// Marks end of stream and wakes every suspended caller. Idempotent.
    pub fn close(&self) {
        {
            let _queue = self.queue.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        self.data_bell.ring();
        self.space_bell.ring();
    }
}
