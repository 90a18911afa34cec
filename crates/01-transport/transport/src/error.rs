//! Error surface for edge buffers.
//!
//! Capacity validation happens once at construction; everything else is a
//! runtime outcome of a push or pop that the caller decides how to handle.

use thiserror::Error;

/// Convenience result alias for fallible transport operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced by edge buffers and channel implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Requested capacity is below the minimum.
    #[error("edge capacity {requested} must be at least {minimum}")]
    InvalidCapacity { requested: usize, minimum: usize },

    /// The edge is full and its overflow policy is `error`.
    #[error("edge buffer full (capacity {capacity})")]
    BufferFull { capacity: usize },

    /// A non-blocking push found a full `block` edge.
    #[error("edge buffer would block (capacity {capacity})")]
    WouldBlock { capacity: usize },

    /// The edge was closed before the item could be delivered.
    #[error("edge closed")]
    Closed,

    /// A blocked operation observed its cancellation token.
    #[error("edge operation cancelled")]
    Cancelled,

    /// A serialized edge failed to encode or decode an item.
    #[error("codec error: {0}")]
    Codec(String),
}

impl TransportError {
    pub fn codec(msg: impl Into<String>) -> Self {
        TransportError::Codec(msg.into())
    }
}
