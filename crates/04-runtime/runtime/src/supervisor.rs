use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{log_module_failure, ModuleFailure};
use crate::handle::{ModuleHandle, StopMode};

/// What a module failure does to the rest of the network.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Only the failing module stops; its edges close.
    #[default]
    Isolate,
    /// Any failure abandons every module in the network.
    Fatal,
}

/// Applies the failure policy on behalf of one network.
#[derive(Debug, Default)]
pub struct Supervisor {
    policy: FailurePolicy,
    fatal: Mutex<Option<ModuleFailure>>,
    modules: RwLock<Vec<ModuleHandle>>,
}

impl Supervisor {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn watch(&self, handle: ModuleHandle) {
        self.modules.write().push(handle);
    }

    /// First failure that brought the network down under `Fatal`.
    pub fn fatal(&self) -> Option<ModuleFailure> {
        self.fatal.lock().clone()
    }

    pub(crate) fn report_failure(&self, failure: &ModuleFailure) {
        log_module_failure(failure);
        if self.policy != FailurePolicy::Fatal {
            return;
        }
        {
            let mut fatal = self.fatal.lock();
            if fatal.is_some() {
                return;
            }
            *fatal = Some(failure.clone());
        }
        tracing::error!(module = %failure.module, "fatal failure policy: stopping network");
        for module in self.modules.read().iter() {
            module.request_stop(StopMode::Abandon);
        }
    }
}
