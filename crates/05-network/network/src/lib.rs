//! Composition of modules into a running incremental-unit network.
//!
//! [`Network`] wires modules with bounded edges, checks payload
//! compatibility up front, runs setup and start in dependency order, and
//! exposes introspection: module handles, a unit registry, taps, and
//! serializable snapshots.

mod config;
mod error;
mod network;
mod order;
mod snapshot;

pub use config::{EdgeSpec, ModuleSpec, NetworkConfig, TopologyConfig, DEFAULT_IDLE_BACKOFF_MS};
pub use error::{NetworkError, NetworkResult, WiringError};
pub use network::Network;
pub use snapshot::{EdgeSnapshot, ModuleSnapshot, NetworkSnapshot};
