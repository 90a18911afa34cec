use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use iu::{Iu, ModuleId, PayloadType};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use transport::{CancelToken, Doorbell};

use crate::error::{ModuleError, ModuleFailure};
use crate::state::{ModuleState, StateCell};
use crate::stats::{ModuleStats, ModuleStatsSnapshot};

/// Undelivered errors a module's error channel holds before new ones are
/// counted as lost.
pub const ERROR_CHANNEL_CAPACITY: usize = 256;

/// What a stopping module does with input that is already pending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Process what is already queued, without waiting for more.
    #[default]
    Drain = 1,
    /// Discard pending input and cancel blocked pushes.
    Abandon = 2,
}

impl StopMode {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(StopMode::Drain),
            2 => Some(StopMode::Abandon),
            _ => None,
        }
    }
}

/// State shared between a module's worker and its handles.
pub(crate) struct ModuleShared {
    pub(crate) id: ModuleId,
    pub(crate) state: StateCell,
    pub(crate) stats: ModuleStats,
    /// Rung by every input edge; the worker parks on it.
    pub(crate) bell: Arc<Doorbell>,
    pub(crate) cancel: CancelToken,
    input_types: Vec<PayloadType>,
    output_types: Vec<PayloadType>,
    stop: AtomicU8,
    terminal: Mutex<Option<ModuleFailure>>,
    errors_tx: Sender<ModuleError>,
    errors_rx: Receiver<ModuleError>,
    outputs: RwLock<Vec<Iu>>,
}

impl ModuleShared {
    pub(crate) fn new(id: ModuleId, input_types: Vec<PayloadType>, output_types: Vec<PayloadType>) -> Self {
        let (errors_tx, errors_rx) = bounded(ERROR_CHANNEL_CAPACITY);
        Self {
            id,
            state: StateCell::new(),
            stats: ModuleStats::default(),
            bell: Arc::new(Doorbell::new()),
            cancel: CancelToken::new(),
            input_types,
            output_types,
            stop: AtomicU8::new(0),
            terminal: Mutex::new(None),
            errors_tx,
            errors_rx,
            outputs: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn stop_requested(&self) -> Option<StopMode> {
        StopMode::from_u8(self.stop.load(Ordering::Acquire))
    }

    pub(crate) fn report(&self, error: ModuleError) {
        tracing::warn!(module = %self.id, %error, "module error");
        let delivered = self.errors_tx.try_send(error).is_ok();
        self.stats.record_error(delivered);
    }

    /// Keeps the first terminal failure.
    pub(crate) fn set_terminal(&self, failure: ModuleFailure) {
        let mut terminal = self.terminal.lock();
        if terminal.is_none() {
            *terminal = Some(failure);
        }
    }

    pub(crate) fn publish_outputs(&self, units: Vec<Iu>) {
        *self.outputs.write() = units;
    }
}

/// Thread-safe view of a module for network owners and introspection tools.
#[derive(Clone)]
pub struct ModuleHandle {
    pub(crate) shared: Arc<ModuleShared>,
}

impl ModuleHandle {
    pub fn id(&self) -> &ModuleId {
        &self.shared.id
    }

    pub fn state(&self) -> ModuleState {
        self.shared.state.load()
    }

    pub fn stats(&self) -> ModuleStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Failure that ended the module, if any.
    pub fn terminal_error(&self) -> Option<ModuleFailure> {
        self.shared.terminal.lock().clone()
    }

    /// Receiver for recoverable errors reported by this module.
    pub fn errors(&self) -> Receiver<ModuleError> {
        self.shared.errors_rx.clone()
    }

    /// Units this module published that are still active, as of its last
    /// processing step.
    pub fn outputs(&self) -> Vec<Iu> {
        self.shared.outputs.read().clone()
    }

    pub fn input_types(&self) -> &[PayloadType] {
        &self.shared.input_types
    }

    pub fn output_types(&self) -> &[PayloadType] {
        &self.shared.output_types
    }

    /// Doorbell shared by every input edge of this module.
    pub fn doorbell(&self) -> Arc<Doorbell> {
        Arc::clone(&self.shared.bell)
    }

    /// Asks the worker to stop. A later `Abandon` overrides an earlier
    /// `Drain`; repeated requests are harmless.
    pub fn request_stop(&self, mode: StopMode) {
        self.shared.stop.fetch_max(mode as u8, Ordering::AcqRel);
        if self.shared.state.begin_stopping() {
            tracing::debug!(module = %self.shared.id, ?mode, "stop requested");
        }
        if mode == StopMode::Abandon {
            self.shared.cancel.cancel();
        }
        self.shared.bell.ring();
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}
