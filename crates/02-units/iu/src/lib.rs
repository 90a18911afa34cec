//! Incremental units (IUs) and the update messages that carry them.
//!
//! * [`Iu`] – shared handle to a unit: immutable payload, weak grounding
//!   links, atomic status (`Active`, then `Revoked` or `Committed`).
//! * [`IuBuilder`] – the only place a payload is written before publication.
//! * [`UpdateMessage`] – ordered `(unit, ADD | REVOKE | COMMIT)` batch.
//! * [`Payload`] / [`PayloadType`] – static payload tags checked at wiring
//!   time, plus the standard [`Text`], [`Audio`] and [`Speech`] payloads.

mod error;
mod id;
mod payload;
mod unit;
mod update;

pub use error::{IuError, IuResult};
pub use id::{IuId, ModuleId};
pub use payload::{Audio, DynPayload, Payload, PayloadType, Speech, Text};
pub use unit::{Iu, IuBuilder, IuStatus, Transition, WeakIu};
pub use update::{UpdateMessage, UpdateType};
