//! Network and topology configuration.
//!
//! Both structs deserialize from JSON with every field optional, so a
//! topology file only spells out what differs from the defaults.

use std::time::Duration;

use runtime::{FailurePolicy, StopMode};
use serde::{Deserialize, Serialize};
use transport::{BufferConfig, OverflowPolicy};

/// Default sleep between `produce` calls that emitted nothing.
pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Capacity and overflow policy for edges connected without their own.
    pub default_edge: BufferConfig,
    pub failure_policy: FailurePolicy,
    /// How `Network::stop` stops each module.
    pub stop_mode: StopMode,
    /// Flag outputs that ground in revoked units.
    pub validate_grounding: bool,
    pub idle_backoff_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_edge: BufferConfig::default(),
            failure_policy: FailurePolicy::Isolate,
            stop_mode: StopMode::Drain,
            validate_grounding: false,
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
        }
    }
}

impl NetworkConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Declarative network: which modules exist and how they are connected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub network: NetworkConfig,
    pub modules: Vec<ModuleSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl TopologyConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// One module instance. `kind` selects the constructor; `options` is handed
/// to it verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// One edge. Missing `capacity` or `overflow` fall back to the network's
/// `default_edge`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub input: String,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default, alias = "overflow_policy")]
    pub overflow: Option<OverflowPolicy>,
    /// Carry messages in serialized form instead of sharing unit handles.
    #[serde(default)]
    pub serialized: bool,
}

impl EdgeSpec {
    pub fn buffer_config(&self, defaults: BufferConfig) -> BufferConfig {
        BufferConfig {
            capacity: self.capacity.unwrap_or(defaults.capacity),
            overflow: self.overflow.unwrap_or(defaults.overflow),
        }
    }
}
