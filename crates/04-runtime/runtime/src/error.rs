//! Error surface of the module runtime.
//!
//! [`ModuleError`]s are recoverable and land on the reporting module's error
//! channel. A [`ModuleFailure`] ends the module's loop and is kept as its
//! terminal error.

use std::fmt;

use iu::{IuError, IuId, ModuleId, UpdateType};
use serde::Serialize;
use thiserror::Error;
use transport::TransportError;

use crate::state::ModuleState;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Lifecycle transition not allowed from the module's current state.
    #[error("module `{module}` cannot move from {from:?} to {to:?}")]
    InvalidState {
        module: ModuleId,
        from: ModuleState,
        to: ModuleState,
    },

    #[error("failed to spawn worker for `{module}`: {reason}")]
    Spawn { module: ModuleId, reason: String },
}

/// Recoverable problem reported on a module's error channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// An emitted REVOKE/COMMIT asked for an illegal status change.
    #[error("{module}: {source}")]
    Transition {
        module: ModuleId,
        #[source]
        source: IuError,
    },

    /// An entry broke the update protocol and was dropped.
    #[error("{module}: dropped {update:?} of {id}: {reason}")]
    Protocol {
        module: ModuleId,
        id: IuId,
        update: UpdateType,
        reason: &'static str,
    },

    /// A module tried to emit a unit created by another module.
    #[error("{module}: cannot emit {id} created by `{creator}`")]
    ForeignUnit {
        module: ModuleId,
        id: IuId,
        creator: ModuleId,
    },

    /// An active or committed output grounds in a revoked unit.
    #[error("{module}: {id} grounds in revoked {revoked}")]
    GroundingViolation {
        module: ModuleId,
        id: IuId,
        revoked: IuId,
    },

    /// Delivery to one subscriber failed; the other subscribers were served.
    #[error("{module}: push to `{subscriber}` input `{input}` failed: {source}")]
    Push {
        module: ModuleId,
        subscriber: ModuleId,
        input: String,
        #[source]
        source: TransportError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    Setup,
    Process,
    Produce,
    Teardown,
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            FailurePhase::Setup => "setup",
            FailurePhase::Process => "process_update",
            FailurePhase::Produce => "produce",
            FailurePhase::Teardown => "teardown",
        };
        f.write_str(phase)
    }
}

/// Uncaught error or panic inside a module callback.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("module `{module}` failed during {phase}: {message}")]
pub struct ModuleFailure {
    pub module: ModuleId,
    pub phase: FailurePhase,
    pub message: String,
}

impl ModuleFailure {
    pub fn from_error(module: ModuleId, phase: FailurePhase, err: &anyhow::Error) -> Self {
        Self {
            module,
            phase,
            message: format!("{err:#}"),
        }
    }

    pub fn from_panic(module: ModuleId, phase: FailurePhase, panic: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(text) = panic.downcast_ref::<&'static str>() {
            format!("panicked: {text}")
        } else if let Some(text) = panic.downcast_ref::<String>() {
            format!("panicked: {text}")
        } else {
            "panicked".to_owned()
        };
        Self {
            module,
            phase,
            message,
        }
    }
}

/// Logs a module failure with the module and phase as structured fields.
pub fn log_module_failure(failure: &ModuleFailure) {
    tracing::error!(
        module = %failure.module,
        phase = %failure.phase,
        "{}",
        failure.message
    );
}
