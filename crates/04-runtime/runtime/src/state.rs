use std::sync::atomic::{AtomicU8, Ordering};

use iu::ModuleId;
use serde::Serialize;

use crate::error::{RuntimeError, RuntimeResult};

/// Module lifecycle. Only `Running` modules pop from inputs and push to
/// subscribers.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    Created = 0,
    Wired = 1,
    SetUp = 2,
    Running = 3,
    Stopping = 4,
    TornDown = 5,
}

impl ModuleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ModuleState::Created,
            1 => ModuleState::Wired,
            2 => ModuleState::SetUp,
            3 => ModuleState::Running,
            4 => ModuleState::Stopping,
            _ => ModuleState::TornDown,
        }
    }

    /// Legal single-step transitions. A module whose setup failed, or whose
    /// network failed to start, goes straight to `TornDown`.
    pub fn can_transition(self, to: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, to),
            (Created, Wired)
                | (Wired, SetUp)
                | (SetUp, Running)
                | (Running, Stopping)
                | (Stopping, TornDown)
                | (Created, TornDown)
                | (Wired, TornDown)
                | (SetUp, TornDown)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ModuleState::TornDown
    }
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        StateCell(AtomicU8::new(ModuleState::Created as u8))
    }

    pub(crate) fn load(&self) -> ModuleState {
        ModuleState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Compare-and-set from the current state to `to`, if legal.
    pub(crate) fn advance(&self, module: &ModuleId, to: ModuleState) -> RuntimeResult<()> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let from = ModuleState::from_u8(current);
            if !from.can_transition(to) {
                return Err(RuntimeError::InvalidState {
                    module: module.clone(),
                    from,
                    to,
                });
            }
            match self
                .0
                .compare_exchange(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Moves `Running -> Stopping`; a no-op in any other state.
    pub(crate) fn begin_stopping(&self) -> bool {
        self.0
            .compare_exchange(
                ModuleState::Running as u8,
                ModuleState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
