//! Edge primitives for the incremental-unit network.
//!
//! * [`Buffer`] – bounded FIFO between one producer and one consumer, with a
//!   per-edge [`OverflowPolicy`].
//! * [`Doorbell`] – futex-backed sequence word that parks producers and
//!   consumers; several edges can share one consumer doorbell.
//! * [`CancelToken`] – cooperative cancellation for blocked pushes and pops.
//! * [`Channel`] – the edge contract that serialized transports implement.
//! * [`TransportError`] – capacity validation and push/pop failures.

mod buffer;
mod cancel;
mod channel;
mod config;
mod error;
mod metrics;
mod record;
pub mod wait;

pub use buffer::{Buffer, Pop};
pub use cancel::CancelToken;
pub use channel::Channel;
pub use config::{BufferConfig, OverflowPolicy, DEFAULT_CAPACITY};
pub use error::{TransportError, TransportResult};
pub use metrics::{PortMetricsSnapshot, PushOutcome};
pub use record::{Envelope, Record};
pub use wait::{Doorbell, WaitResult};
