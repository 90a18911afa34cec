//! Scriptable modules shared by the scenario tests.

use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use iu::{Iu, IuStatus, Payload, PayloadType, Text, UpdateMessage, UpdateType};
use network::NetworkConfig;
use runtime::{Module, ModuleContext};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type Action =
    Box<dyn FnOnce(&mut ModuleContext) -> anyhow::Result<Option<UpdateMessage>> + Send>;

pub fn quick_config() -> NetworkConfig {
    NetworkConfig {
        idle_backoff_ms: 1,
        ..NetworkConfig::default()
    }
}

/// Source that runs whatever the test [`Driver`] sends it. Finishes once
/// the driver is dropped.
pub struct Scripted {
    name: String,
    actions: Receiver<Action>,
}

pub fn scripted(name: &str) -> (Box<dyn Module>, Driver) {
    let (tx, rx) = unbounded();
    (
        Box::new(Scripted {
            name: name.to_owned(),
            actions: rx,
        }),
        Driver { actions: tx },
    )
}

impl Module for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn process_update(
        &mut self,
        _input: &str,
        _message: &UpdateMessage,
        _ctx: &mut ModuleContext,
    ) -> anyhow::Result<Option<UpdateMessage>> {
        Ok(None)
    }

    fn produce(&mut self, ctx: &mut ModuleContext) -> anyhow::Result<Option<UpdateMessage>> {
        match self.actions.try_recv() {
            Ok(action) => action(ctx),
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                ctx.finish();
                Ok(None)
            }
        }
    }
}

/// Test-side handle of a [`Scripted`] source.
pub struct Driver {
    actions: Sender<Action>,
}

impl Driver {
    pub fn run(&self, action: Action) {
        self.actions.send(action).expect("source alive");
    }

    /// Emits `ADD` of a new text unit without waiting for it.
    pub fn emit(&self, text: &str) {
        let text = text.to_owned();
        self.run(Box::new(move |ctx| {
            let iu = ctx.create_iu(Text::new(text)).build();
            Ok(Some(UpdateMessage::from_iu(iu, UpdateType::Add)?))
        }));
    }

    /// Emits `ADD` of a new text unit grounded in `grounds` and returns it
    /// once the source has built it.
    pub fn add_grounded(&self, text: &str, grounds: &[Iu]) -> Iu {
        let (tx, rx) = bounded(1);
        let text = text.to_owned();
        let grounds = grounds.to_vec();
        self.run(Box::new(move |ctx| {
            let iu = ctx
                .create_iu(Text::new(text))
                .grounded_in_all(&grounds)
                .build();
            tx.send(iu.clone())?;
            Ok(Some(UpdateMessage::from_iu(iu, UpdateType::Add)?))
        }));
        rx.recv_timeout(TIMEOUT).expect("unit built")
    }

    pub fn add(&self, text: &str) -> Iu {
        self.add_grounded(text, &[])
    }

    pub fn revoke(&self, iu: &Iu) {
        self.update(iu, UpdateType::Revoke);
    }

    pub fn commit(&self, iu: &Iu) {
        self.update(iu, UpdateType::Commit);
    }

    fn update(&self, iu: &Iu, update: UpdateType) {
        let iu = iu.clone();
        self.run(Box::new(move |_ctx| {
            Ok(Some(UpdateMessage::from_iu(iu, update)?))
        }));
    }
}

/// One entry as seen by an [`Observer`].
#[derive(Clone, Debug)]
pub struct Observed {
    pub input: String,
    pub update: UpdateType,
    pub iu: Iu,
    /// Status of the unit when the entry was processed.
    pub status: IuStatus,
}

impl Observed {
    pub fn text(&self) -> String {
        self.iu
            .payload_as::<Text>()
            .map(|text| text.text.clone())
            .unwrap_or_default()
    }
}

/// Holds an [`Observer`] inside `process_update` until the test hands out
/// a permit or drops the gate.
pub struct Gate {
    pub entered: Receiver<()>,
    permits: Sender<()>,
}

impl Gate {
    pub fn release(&self) {
        self.permits.send(()).expect("observer alive");
    }

    /// Lets every pending and future message through.
    pub fn open(self) {
        drop(self.permits);
    }
}

struct GateInner {
    entered: Sender<()>,
    permits: Receiver<()>,
}

/// Sink that reports every entry it processes.
pub struct Observer {
    name: String,
    seen: Sender<Observed>,
    gate: Option<GateInner>,
    fail: Option<Failure>,
}

#[derive(Clone, Copy, Debug)]
pub enum Failure {
    Error,
    Panic,
}

pub fn observer(name: &str) -> (Observer, Receiver<Observed>) {
    let (tx, rx) = unbounded();
    (
        Observer {
            name: name.to_owned(),
            seen: tx,
            gate: None,
            fail: None,
        },
        rx,
    )
}

impl Observer {
    pub fn gated(mut self) -> (Self, Gate) {
        let (entered_tx, entered_rx) = unbounded();
        let (permits_tx, permits_rx) = unbounded();
        self.gate = Some(GateInner {
            entered: entered_tx,
            permits: permits_rx,
        });
        (
            self,
            Gate {
                entered: entered_rx,
                permits: permits_tx,
            },
        )
    }

    /// Fails on the first message instead of observing it.
    pub fn failing(mut self, failure: Failure) -> Self {
        self.fail = Some(failure);
        self
    }

    pub fn boxed(self) -> Box<dyn Module> {
        Box::new(self)
    }
}

impl Module for Observer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![PayloadType::ANY]
    }

    fn process_update(
        &mut self,
        input: &str,
        message: &UpdateMessage,
        _ctx: &mut ModuleContext,
    ) -> anyhow::Result<Option<UpdateMessage>> {
        if let Some(gate) = &self.gate {
            let _ = gate.entered.send(());
            // A dropped gate lets everything through.
            let _ = gate.permits.recv();
        }
        match self.fail {
            Some(Failure::Error) => anyhow::bail!("{} refuses input", self.name),
            Some(Failure::Panic) => panic!("{} lost its state", self.name),
            None => {}
        }
        for (iu, update) in message.iter() {
            self.seen.send(Observed {
                input: input.to_owned(),
                update,
                iu: iu.clone(),
                status: iu.status(),
            })?;
        }
        Ok(None)
    }
}

/// Next observation, or a panic after [`TIMEOUT`].
pub fn next(seen: &Receiver<Observed>) -> Observed {
    seen.recv_timeout(TIMEOUT).expect("observation")
}

/// Asserts that nothing arrives within `wait`.
pub fn assert_quiet(seen: &Receiver<Observed>, wait: Duration) {
    match seen.recv_timeout(wait) {
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => {}
        Ok(observed) => panic!("unexpected observation {observed:?}"),
    }
}
