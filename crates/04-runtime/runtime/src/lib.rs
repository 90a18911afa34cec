//! Module runtime for the incremental-unit network.
//!
//! * [`Module`] – the stage contract (`setup`, `process_update`, `produce`,
//!   `teardown`) plus [`ModuleContext`] for creating units and reading the
//!   module's ledgers.
//! * [`ModuleRunner`] – drives one module through
//!   `Created -> Wired -> SetUp -> Running -> Stopping -> TornDown` on its own
//!   worker thread, with per-step protocol checks and two-phase fan-out.
//! * [`ModuleHandle`] – thread-safe state, stats, errors and output snapshot.
//! * [`Supervisor`], [`TapHub`], [`IuRegistry`] – network-wide collaborators
//!   shared by all workers.

mod error;
mod fanout;
mod handle;
mod ledger;
mod module;
mod registry;
mod runner;
mod state;
mod stats;
mod summary;
mod supervisor;
mod tap;

pub use error::{
    log_module_failure, FailurePhase, ModuleError, ModuleFailure, RuntimeError, RuntimeResult,
};
pub use fanout::{FanOut, Subscriber};
pub use handle::{ModuleHandle, StopMode, ERROR_CHANNEL_CAPACITY};
pub use module::{Module, ModuleContext};
pub use registry::IuRegistry;
pub use runner::{InputPort, ModuleRunner, RunnerEnv};
pub use state::ModuleState;
pub use stats::ModuleStatsSnapshot;
pub use summary::{summarize, EntrySummary, UnitSummary};
pub use supervisor::{FailurePolicy, Supervisor};
pub use tap::{TapHub, TapRecord, TapSummary};
