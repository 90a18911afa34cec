//! The contract every processing stage implements.

use std::sync::Arc;

use iu::{Iu, IuBuilder, IuId, ModuleId, Payload, PayloadType, UpdateMessage};

use crate::handle::ModuleShared;
use crate::ledger::{InputLedger, OutputLedger};

/// A processing stage in the network.
///
/// A module is driven by its own worker thread: `setup` runs once before
/// any message flows, `process_update` once per message popped from an
/// input, `produce` whenever a module without inputs is idle, and `teardown`
/// once after the loop ends. Errors returned from these callbacks (and
/// panics) are module failures.
pub trait Module: Send {
    /// Unique name within the network.
    fn name(&self) -> &str;

    /// Payload types accepted on inputs; [`PayloadType::ANY`] accepts all.
    fn input_types(&self) -> Vec<PayloadType> {
        Vec::new()
    }

    /// Payload types this module creates.
    fn output_types(&self) -> Vec<PayloadType> {
        Vec::new()
    }

    fn setup(&mut self, _ctx: &mut ModuleContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handles one message from the input named `input`. The message has
    /// already passed the input ledger: no duplicate ADDs, no REVOKE or
    /// COMMIT for units never added.
    fn process_update(
        &mut self,
        input: &str,
        message: &UpdateMessage,
        ctx: &mut ModuleContext,
    ) -> anyhow::Result<Option<UpdateMessage>>;

    /// Called while a module without inputs has nothing else to do. Return
    /// `None` when there is nothing to emit yet; call
    /// [`ModuleContext::finish`] to end the stream.
    fn produce(&mut self, _ctx: &mut ModuleContext) -> anyhow::Result<Option<UpdateMessage>> {
        Ok(None)
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Per-module state handed to every callback.
pub struct ModuleContext {
    id: ModuleId,
    shared: Arc<ModuleShared>,
    pub(crate) inputs: InputLedger,
    pub(crate) outputs: OutputLedger,
    finished: bool,
}

impl ModuleContext {
    pub(crate) fn new(shared: Arc<ModuleShared>) -> Self {
        Self {
            id: shared.id.clone(),
            shared,
            inputs: InputLedger::default(),
            outputs: OutputLedger::default(),
            finished: false,
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Starts a unit owned by this module, chained to the unit it added last.
    pub fn create_iu<P: Payload>(&self, payload: P) -> IuBuilder {
        let builder = IuBuilder::new(self.id.clone(), payload);
        match self.outputs.last_added() {
            Some(previous) => builder.previous_link(previous.clone()),
            None => builder,
        }
    }

    /// Active units received on any input.
    pub fn input_units(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.inputs.units()
    }

    /// Active units received on the input named `input`.
    pub fn input_units_from<'a>(&'a self, input: &'a str) -> impl Iterator<Item = &'a Iu> + 'a {
        self.inputs.units_from(input)
    }

    pub fn input_unit(&self, id: IuId) -> Option<&Iu> {
        self.inputs.get(id)
    }

    /// Units this module published that are neither revoked nor committed.
    pub fn active_outputs(&self) -> impl Iterator<Item = &Iu> + '_ {
        self.outputs.active()
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.stop_requested().is_some()
    }

    /// Ends this module's stream after the current callback returns.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
