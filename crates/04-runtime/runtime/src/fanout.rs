//! Delivery of one module's output to all of its subscribers.
//!
//! Delivery is two-phase. Every subscriber first gets a non-blocking push;
//! only the edges that were full under `block` are then pushed to blocking,
//! in subscription order. A stalled consumer therefore never delays a sibling
//! whose edge had room.

use std::sync::Arc;

use iu::{ModuleId, UpdateMessage};
use smallvec::SmallVec;
use transport::{CancelToken, Channel, PushOutcome, TransportError};

use crate::error::ModuleError;

/// Producer-side end of one edge.
#[derive(Clone)]
pub struct Subscriber {
    pub consumer: ModuleId,
    pub input: Arc<str>,
    pub edge: Arc<dyn Channel<UpdateMessage>>,
}

/// Result of a delivery round.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    Complete,
    /// A blocking push observed the module's cancellation token.
    Cancelled,
}

#[derive(Clone, Default)]
pub struct FanOut {
    subscribers: SmallVec<[Subscriber; 4]>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub(crate) fn deliver(
        &self,
        producer: &ModuleId,
        message: &UpdateMessage,
        cancel: &CancelToken,
        errors: &mut Vec<ModuleError>,
    ) -> Delivery {
        let mut blocked: SmallVec<[&Subscriber; 4]> = SmallVec::new();
        for subscriber in &self.subscribers {
            match subscriber.edge.try_push(message.clone()) {
                Ok(outcome) => note(producer, subscriber, outcome),
                Err(TransportError::WouldBlock { .. }) => blocked.push(subscriber),
                Err(source) => errors.push(push_error(producer, subscriber, source)),
            }
        }

        for subscriber in blocked {
            tracing::trace!(subscriber = %subscriber.consumer, input = %subscriber.input, "edge full, waiting");
            match subscriber.edge.push_cancellable(message.clone(), cancel) {
                Ok(outcome) => note(producer, subscriber, outcome),
                Err(TransportError::Cancelled) => return Delivery::Cancelled,
                Err(source) => errors.push(push_error(producer, subscriber, source)),
            }
        }
        Delivery::Complete
    }

    /// Closes every outgoing edge; consumers see end of stream once drained.
    pub fn close_all(&self) {
        for subscriber in &self.subscribers {
            subscriber.edge.close();
        }
    }
}

fn note(producer: &ModuleId, subscriber: &Subscriber, outcome: PushOutcome) {
    if outcome == PushOutcome::DroppedOldest {
        tracing::warn!(
            module = %producer,
            subscriber = %subscriber.consumer,
            input = %subscriber.input,
            "lossy edge evicted a pending message"
        );
    }
}

fn push_error(producer: &ModuleId, subscriber: &Subscriber, source: TransportError) -> ModuleError {
    ModuleError::Push {
        module: producer.clone(),
        subscriber: subscriber.consumer.clone(),
        input: subscriber.input.to_string(),
        source,
    }
}
