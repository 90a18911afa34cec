//! Serializable point-in-time view of a network for introspection tools.

use iu::{ModuleId, PayloadType};
use runtime::{ModuleFailure, ModuleHandle, ModuleState, ModuleStatsSnapshot, UnitSummary};
use serde::Serialize;
use transport::{BufferConfig, PortMetricsSnapshot};

#[derive(Clone, Debug, Serialize)]
pub struct NetworkSnapshot {
    pub modules: Vec<ModuleSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    /// Units emitted by any module that are still referenced somewhere.
    pub live_units: usize,
    /// Tap records discarded because a tap was full.
    pub taps_dropped: u64,
}

impl NetworkSnapshot {
    pub fn module(&self, name: &str) -> Option<&ModuleSnapshot> {
        self.modules.iter().find(|module| module.name.as_str() == name)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ModuleSnapshot {
    pub name: ModuleId,
    pub state: ModuleState,
    pub input_types: Vec<PayloadType>,
    pub output_types: Vec<PayloadType>,
    pub stats: ModuleStatsSnapshot,
    /// Published units that are still active.
    pub outputs: Vec<UnitSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_error: Option<ModuleFailure>,
}

impl ModuleSnapshot {
    pub(crate) fn of(handle: &ModuleHandle) -> Self {
        Self {
            name: handle.id().clone(),
            state: handle.state(),
            input_types: handle.input_types().to_vec(),
            output_types: handle.output_types().to_vec(),
            stats: handle.stats(),
            outputs: handle.outputs().iter().map(UnitSummary::of).collect(),
            terminal_error: handle.terminal_error(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct EdgeSnapshot {
    pub from: ModuleId,
    pub to: ModuleId,
    pub input: String,
    pub config: BufferConfig,
    pub serialized: bool,
    /// Messages pending at snapshot time.
    pub depth: usize,
    pub closed: bool,
    pub metrics: PortMetricsSnapshot,
}
