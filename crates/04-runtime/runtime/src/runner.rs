//! Worker that drives one module through its lifecycle.
//!
//! Every module runs its dispatch loop on a dedicated thread. The loop pops
//! one message at a time, round-robin across inputs, so no input can starve
//! another; when nothing is pending it parks on the module's doorbell, which
//! every input edge rings on push and close. Modules without inputs call
//! `produce` instead, backing off briefly whenever it has nothing to emit.
//!
//! After each step the output passes the output ledger, is offered to the
//! taps, then fans out. The loop ends on a stop request, on a failure, when a
//! module finishes its stream, or when every input is closed and drained.
//! Either way the outputs close, so end of stream cascades downstream.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use iu::{ModuleId, UpdateMessage};
use transport::Channel;

use crate::error::{FailurePhase, ModuleError, ModuleFailure, RuntimeError, RuntimeResult};
use crate::fanout::{Delivery, FanOut, Subscriber};
use crate::handle::{ModuleHandle, ModuleShared, StopMode};
use crate::module::{Module, ModuleContext};
use crate::registry::IuRegistry;
use crate::state::ModuleState;
use crate::supervisor::Supervisor;
use crate::tap::TapHub;

/// Network-wide collaborators every worker reports to.
#[derive(Clone, Debug)]
pub struct RunnerEnv {
    pub supervisor: Arc<Supervisor>,
    pub taps: Arc<TapHub>,
    pub registry: Arc<IuRegistry>,
    /// Flag outputs that ground in revoked units after every step.
    pub validate_grounding: bool,
    /// Sleep between `produce` calls that emitted nothing.
    pub idle_backoff: Duration,
}

/// Consumer-side end of one edge.
#[derive(Clone)]
pub struct InputPort {
    pub name: Arc<str>,
    pub edge: Arc<dyn Channel<UpdateMessage>>,
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Idle,
    Cancelled,
}

pub struct ModuleRunner {
    module: Box<dyn Module>,
    ctx: ModuleContext,
    shared: Arc<ModuleShared>,
    inputs: Vec<InputPort>,
    fanout: FanOut,
    env: RunnerEnv,
    set_up: bool,
}

impl ModuleRunner {
    pub fn new(module: Box<dyn Module>, env: RunnerEnv) -> Self {
        let shared = Arc::new(ModuleShared::new(
            ModuleId::from(module.name()),
            module.input_types(),
            module.output_types(),
        ));
        Self {
            ctx: ModuleContext::new(Arc::clone(&shared)),
            module,
            shared,
            inputs: Vec::new(),
            fanout: FanOut::new(),
            env,
            set_up: false,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.shared.id
    }

    pub fn handle(&self) -> ModuleHandle {
        ModuleHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|port| port.name.as_ref() == name)
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn add_input(&mut self, port: InputPort) {
        self.inputs.push(port);
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.fanout.subscribe(subscriber);
    }

    /// Closes wiring: `Created -> Wired`.
    pub fn wire(&self) -> RuntimeResult<()> {
        self.shared.state.advance(&self.shared.id, ModuleState::Wired)
    }

    /// Runs the module's `setup` on the calling thread: `Wired -> SetUp`.
    pub fn setup(&mut self) -> Result<(), ModuleFailure> {
        let id = self.shared.id.clone();
        self.shared
            .state
            .advance(&id, ModuleState::SetUp)
            .map_err(|err| ModuleFailure {
                module: id.clone(),
                phase: FailurePhase::Setup,
                message: err.to_string(),
            })?;
        let span = tracing::info_span!("module", name = %id);
        let _entered = span.enter();
        let module = &mut self.module;
        let ctx = &mut self.ctx;
        let result = panic::catch_unwind(AssertUnwindSafe(|| module.setup(ctx)));
        match self.callback_result(FailurePhase::Setup, result) {
            Ok(()) => {
                self.set_up = true;
                tracing::debug!("setup complete");
                Ok(())
            }
            Err(failure) => {
                self.shared.set_terminal(failure.clone());
                Err(failure)
            }
        }
    }

    /// Tears down a module that will never run and closes its edges.
    pub fn abort(mut self) {
        let span = tracing::info_span!("module", name = %self.shared.id);
        let _entered = span.enter();
        if self.set_up {
            self.teardown();
        }
        self.close_edges();
        if let Err(err) = self
            .shared
            .state
            .advance(&self.shared.id, ModuleState::TornDown)
        {
            tracing::warn!(%err, "abort");
        }
    }

    /// `SetUp -> Running`, then hands the loop to a dedicated thread.
    pub fn start(self) -> RuntimeResult<JoinHandle<()>> {
        let id = self.shared.id.clone();
        self.shared.state.advance(&id, ModuleState::Running)?;
        thread::Builder::new()
            .name(format!("iu-{id}"))
            .spawn(move || self.run())
            .map_err(|err| RuntimeError::Spawn {
                module: id,
                reason: err.to_string(),
            })
    }

    fn run(mut self) {
        let span = tracing::info_span!("module", name = %self.shared.id);
        let _entered = span.enter();
        tracing::debug!(
            inputs = self.inputs.len(),
            subscribers = self.fanout.len(),
            "running"
        );

        let outcome = self.run_loop();
        self.shared.state.begin_stopping();
        self.close_edges();
        if let Err(failure) = outcome {
            self.fail(failure);
        }
        self.teardown();
        if let Err(err) = self
            .shared
            .state
            .advance(&self.shared.id, ModuleState::TornDown)
        {
            tracing::warn!(%err, "teardown");
        }
        tracing::debug!("torn down");
    }

    fn run_loop(&mut self) -> Result<(), ModuleFailure> {
        let mut cursor = 0;
        loop {
            let seen = self.shared.bell.seq();
            match self.shared.stop_requested() {
                Some(StopMode::Abandon) => {
                    tracing::debug!("abandoning pending input");
                    return Ok(());
                }
                Some(StopMode::Drain) => return self.drain(&mut cursor),
                None => {}
            }
            if self.ctx.is_finished() {
                tracing::debug!("stream finished");
                return Ok(());
            }

            if let Some((port, message)) = self.next_message(&mut cursor) {
                if self.step(port, message)? == Step::Cancelled {
                    return Ok(());
                }
                continue;
            }

            if self.inputs.is_empty() {
                if self.produce()? == Step::Cancelled {
                    return Ok(());
                }
                continue;
            }

            if self.inputs.iter().all(|port| port.edge.is_drained()) {
                tracing::debug!("all inputs closed");
                return Ok(());
            }
            self.shared.bell.wait(seen);
        }
    }

    /// Processes what is already pending, without waiting for more.
    fn drain(&mut self, cursor: &mut usize) -> Result<(), ModuleFailure> {
        let mut drained = 0usize;
        while let Some((port, message)) = self.next_message(cursor) {
            if self.step(port, message)? == Step::Cancelled
                || self.shared.stop_requested() == Some(StopMode::Abandon)
                || self.ctx.is_finished()
            {
                break;
            }
            drained += 1;
        }
        tracing::debug!(drained, "drained pending input");
        Ok(())
    }

    fn next_message(&self, cursor: &mut usize) -> Option<(usize, UpdateMessage)> {
        let count = self.inputs.len();
        for offset in 0..count {
            let idx = (*cursor + offset) % count;
            if let Some(message) = self.inputs[idx].edge.try_pop() {
                *cursor = (idx + 1) % count;
                return Some((idx, message));
            }
        }
        None
    }

    fn step(&mut self, port: usize, message: UpdateMessage) -> Result<Step, ModuleFailure> {
        self.shared.stats.record_received();
        let input = Arc::clone(&self.inputs[port].name);
        let received = message.len();
        let mut errors = Vec::new();
        let admitted = self
            .ctx
            .inputs
            .admit(&self.shared.id, &input, message, &mut errors);
        self.shared.stats.record_dropped(received - admitted.len());
        self.report_all(errors);
        if admitted.is_empty() {
            return Ok(Step::Continue);
        }

        tracing::trace!(input = %input, entries = admitted.len(), "process_update");
        let module = &mut self.module;
        let ctx = &mut self.ctx;
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| module.process_update(&input, &admitted, ctx)));
        let output = self.callback_result(FailurePhase::Process, result)?;
        self.shared.stats.record_step();
        Ok(match output {
            Some(message) => self.emit(message),
            None => Step::Continue,
        })
    }

    fn produce(&mut self) -> Result<Step, ModuleFailure> {
        let module = &mut self.module;
        let ctx = &mut self.ctx;
        let result = panic::catch_unwind(AssertUnwindSafe(|| module.produce(ctx)));
        match self.callback_result(FailurePhase::Produce, result)? {
            Some(message) => {
                self.shared.stats.record_step();
                Ok(self.emit(message))
            }
            None => {
                if !self.ctx.is_finished() {
                    thread::sleep(self.env.idle_backoff);
                }
                Ok(Step::Idle)
            }
        }
    }

    fn emit(&mut self, mut message: UpdateMessage) -> Step {
        let id = self.shared.id.clone();
        let produced = message.len();
        let mut errors = Vec::new();
        let changed = self.ctx.outputs.publish(&id, &mut message, &mut errors);
        self.shared.stats.record_dropped(produced - message.len());
        if self.env.validate_grounding {
            self.ctx.outputs.validate_grounding(&id, &mut errors);
        }
        if changed {
            self.shared.publish_outputs(self.ctx.outputs.snapshot());
        }
        if message.is_empty() {
            self.report_all(errors);
            return Step::Continue;
        }

        for (iu, update) in message.iter() {
            tracing::trace!(iu = %iu.id(), ?update, "emit");
        }
        for iu in message.added() {
            self.env.registry.record(iu);
        }
        self.shared.stats.record_emitted();
        self.env.taps.offer(&id, &message);
        let delivery = self
            .fanout
            .deliver(&id, &message, &self.shared.cancel, &mut errors);
        self.report_all(errors);
        match delivery {
            Delivery::Complete => Step::Continue,
            Delivery::Cancelled => Step::Cancelled,
        }
    }

    fn teardown(&mut self) {
        let module = &mut self.module;
        let result = panic::catch_unwind(AssertUnwindSafe(|| module.teardown()));
        if let Err(failure) = self.callback_result(FailurePhase::Teardown, result) {
            self.fail(failure);
        }
    }

    fn close_edges(&self) {
        self.fanout.close_all();
        for port in &self.inputs {
            port.edge.close();
        }
    }

    fn fail(&self, failure: ModuleFailure) {
        self.shared.set_terminal(failure.clone());
        self.env.supervisor.report_failure(&failure);
    }

    fn report_all(&self, errors: Vec<ModuleError>) {
        for error in errors {
            self.shared.report(error);
        }
    }

    fn callback_result<T>(
        &self,
        phase: FailurePhase,
        result: thread::Result<anyhow::Result<T>>,
    ) -> Result<T, ModuleFailure> {
        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ModuleFailure::from_error(
                self.shared.id.clone(),
                phase,
                &err,
            )),
            Err(panic) => Err(ModuleFailure::from_panic(
                self.shared.id.clone(),
                phase,
                panic.as_ref(),
            )),
        }
    }
}
