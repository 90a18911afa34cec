//! Composition root: owns the modules, their edges, and the shared
//! collaborators (supervisor, taps, unit registry) of one network.
//!
//! Topology is fixed once [`Network::run`] starts the workers. Setup runs
//! consumers before producers so no edge delivers into a module that is not
//! ready; [`Network::stop`] goes the other way so upstream modules drain into
//! consumers that are still running.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use iu::{ModuleId, PayloadType, UpdateMessage};
use runtime::{
    log_module_failure, InputPort, IuRegistry, Module, ModuleHandle, ModuleRunner, RunnerEnv,
    StopMode, Subscriber, Supervisor, TapHub, TapRecord,
};
use transport::{Buffer, BufferConfig, Channel, Doorbell, TransportResult};
use transport_codecs::{CodecChannel, PayloadRegistry};

use crate::config::{ModuleSpec, NetworkConfig, TopologyConfig};
use crate::error::{NetworkError, NetworkResult, WiringError};
use crate::order::dependency_order;
use crate::snapshot::{EdgeSnapshot, ModuleSnapshot, NetworkSnapshot};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Building,
    Running,
    Finished,
}

struct Slot {
    handle: ModuleHandle,
    runner: Option<ModuleRunner>,
    worker: Option<JoinHandle<()>>,
}

struct EdgeRecord {
    from: usize,
    to: usize,
    input: Arc<str>,
    edge: Arc<dyn Channel<UpdateMessage>>,
    serialized: bool,
}

pub struct Network {
    config: NetworkConfig,
    env: RunnerEnv,
    slots: Vec<Slot>,
    index: HashMap<ModuleId, usize>,
    edges: Vec<EdgeRecord>,
    /// Sources-first; fixed by `run`.
    order: Vec<usize>,
    phase: Phase,
}

impl Network {
    pub fn new(config: NetworkConfig) -> Self {
        let env = RunnerEnv {
            supervisor: Arc::new(Supervisor::new(config.failure_policy)),
            taps: Arc::new(TapHub::new()),
            registry: Arc::new(IuRegistry::new()),
            validate_grounding: config.validate_grounding,
            idle_backoff: config.idle_backoff(),
        };
        Self {
            config,
            env,
            slots: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            order: Vec::new(),
            phase: Phase::Building,
        }
    }

    /// Builds a network from a topology file. `factory` turns each module
    /// spec into a module named after the spec.
    pub fn from_topology<F>(topology: &TopologyConfig, mut factory: F) -> NetworkResult<Self>
    where
        F: FnMut(&ModuleSpec) -> anyhow::Result<Box<dyn Module>>,
    {
        let mut network = Network::new(topology.network);
        for spec in &topology.modules {
            let module = factory(spec).map_err(|source| NetworkError::Topology {
                module: spec.name.clone(),
                source,
            })?;
            if module.name() != spec.name {
                return Err(NetworkError::Topology {
                    module: spec.name.clone(),
                    source: anyhow::anyhow!("constructor named the module `{}`", module.name()),
                });
            }
            network.add_module(module)?;
        }

        let mut payloads = None;
        for edge in &topology.edges {
            let config = edge.buffer_config(network.config.default_edge);
            if edge.serialized {
                let registry = payloads
                    .get_or_insert_with(|| Arc::new(PayloadRegistry::standard()))
                    .clone();
                network.connect_serialized(&edge.from, &edge.to, &edge.input, config, registry)?;
            } else {
                network.connect_with(&edge.from, &edge.to, &edge.input, config)?;
            }
        }
        Ok(network)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn add_module(&mut self, module: Box<dyn Module>) -> Result<ModuleId, WiringError> {
        self.ensure_building()?;
        let runner = ModuleRunner::new(module, self.env.clone());
        let id = runner.id().clone();
        if self.index.contains_key(&id) {
            return Err(WiringError::DuplicateModule(id));
        }
        tracing::debug!(module = %id, "module added");
        self.index.insert(id.clone(), self.slots.len());
        self.slots.push(Slot {
            handle: runner.handle(),
            runner: Some(runner),
            worker: None,
        });
        Ok(id)
    }

    /// Connects `producer` to the `input` of `consumer` with the network's
    /// default edge configuration.
    pub fn connect(&mut self, producer: &str, consumer: &str, input: &str) -> Result<(), WiringError> {
        self.connect_with(producer, consumer, input, self.config.default_edge)
    }

    pub fn connect_with(
        &mut self,
        producer: &str,
        consumer: &str,
        input: &str,
        config: BufferConfig,
    ) -> Result<(), WiringError> {
        if config.overflow.is_lossy() {
            tracing::warn!(
                producer,
                consumer,
                input,
                "drop_oldest edge may lose revocations"
            );
        }
        self.attach(producer, consumer, input, false, |bell| {
            let edge: Arc<dyn Channel<UpdateMessage>> = Arc::new(Buffer::with_doorbell(config, bell)?);
            Ok(edge)
        })
    }

    /// Like [`Network::connect_with`], but the edge carries serialized
    /// messages and the consumer sees mirrors of the producer's units.
    pub fn connect_serialized(
        &mut self,
        producer: &str,
        consumer: &str,
        input: &str,
        config: BufferConfig,
        payloads: Arc<PayloadRegistry>,
    ) -> Result<(), WiringError> {
        self.attach(producer, consumer, input, true, |bell| {
            let edge: Arc<dyn Channel<UpdateMessage>> =
                Arc::new(CodecChannel::with_doorbell(config, payloads, bell)?);
            Ok(edge)
        })
    }

    /// Connects through a caller-built channel. `make_edge` receives the
    /// consumer's doorbell, which the channel must ring on every push and on
    /// close.
    pub fn connect_channel<F>(
        &mut self,
        producer: &str,
        consumer: &str,
        input: &str,
        make_edge: F,
    ) -> Result<(), WiringError>
    where
        F: FnOnce(Arc<Doorbell>) -> TransportResult<Arc<dyn Channel<UpdateMessage>>>,
    {
        self.attach(producer, consumer, input, false, make_edge)
    }

    fn attach<F>(
        &mut self,
        producer: &str,
        consumer: &str,
        input: &str,
        serialized: bool,
        make_edge: F,
    ) -> Result<(), WiringError>
    where
        F: FnOnce(Arc<Doorbell>) -> TransportResult<Arc<dyn Channel<UpdateMessage>>>,
    {
        self.ensure_building()?;
        let from = self.lookup(producer)?;
        let to = self.lookup(consumer)?;
        let consumer_id = self.slots[to].handle.id().clone();
        if from == to {
            return Err(WiringError::SelfLoop(consumer_id));
        }
        if self.slots[to]
            .runner
            .as_ref()
            .is_some_and(|runner| runner.has_input(input))
        {
            return Err(WiringError::DuplicateInput {
                consumer: consumer_id,
                input: input.to_owned(),
            });
        }
        let produces = self.slots[from].handle.output_types();
        let accepts = self.slots[to].handle.input_types();
        if !compatible(produces, accepts) {
            return Err(WiringError::IncompatibleTypes {
                producer: self.slots[from].handle.id().clone(),
                consumer: consumer_id,
                produces: produces.to_vec(),
                accepts: accepts.to_vec(),
            });
        }

        let bell = self.slots[to].handle.doorbell();
        let edge = make_edge(Arc::clone(&bell))?;
        if !Arc::ptr_eq(&edge.consumer_bell(), &bell) {
            return Err(WiringError::DetachedEdge {
                consumer: consumer_id,
                input: input.to_owned(),
            });
        }

        let input: Arc<str> = Arc::from(input);
        if let Some(runner) = self.slots[to].runner.as_mut() {
            runner.add_input(InputPort {
                name: Arc::clone(&input),
                edge: Arc::clone(&edge),
            });
        }
        if let Some(runner) = self.slots[from].runner.as_mut() {
            runner.subscribe(Subscriber {
                consumer: consumer_id,
                input: Arc::clone(&input),
                edge: Arc::clone(&edge),
            });
        }
        tracing::debug!(
            producer,
            consumer,
            input = %input,
            capacity = edge.config().capacity,
            overflow = ?edge.config().overflow,
            serialized,
            "connected"
        );
        self.edges.push(EdgeRecord {
            from,
            to,
            input,
            edge,
            serialized,
        });
        Ok(())
    }

    /// Sets up every module, consumers first, then starts one worker per
    /// module. If any setup fails, the modules already set up are torn down
    /// and the network is finished.
    pub fn run(&mut self) -> NetworkResult<()> {
        self.ensure_building()?;
        let links: Vec<_> = self.edges.iter().map(|edge| (edge.from, edge.to)).collect();
        self.order = dependency_order(self.slots.len(), &links);

        for slot in &self.slots {
            if let Some(runner) = slot.runner.as_ref() {
                runner.wire()?;
            }
        }

        for idx in self.order.clone().into_iter().rev() {
            let Some(runner) = self.slots[idx].runner.as_mut() else {
                continue;
            };
            if let Err(failure) = runner.setup() {
                log_module_failure(&failure);
                self.abort_pending();
                self.phase = Phase::Finished;
                return Err(NetworkError::Setup(failure));
            }
        }

        for slot in &self.slots {
            self.env.supervisor.watch(slot.handle.clone());
        }

        for idx in self.order.clone().into_iter().rev() {
            let Some(runner) = self.slots[idx].runner.take() else {
                continue;
            };
            match runner.start() {
                Ok(worker) => self.slots[idx].worker = Some(worker),
                Err(err) => {
                    tracing::error!(%err, "failed to start network");
                    self.abort_pending();
                    self.halt(StopMode::Abandon);
                    return Err(err.into());
                }
            }
        }

        self.phase = Phase::Running;
        tracing::info!(
            modules = self.slots.len(),
            edges = self.edges.len(),
            policy = ?self.config.failure_policy,
            "network running"
        );
        Ok(())
    }

    /// Stops every module, sources first, joining each worker before moving
    /// downstream. A network that never ran just tears its modules down.
    pub fn stop(&mut self) -> NetworkResult<()> {
        match self.phase {
            Phase::Building => {
                self.abort_pending();
                self.phase = Phase::Finished;
                Ok(())
            }
            Phase::Running => {
                self.halt(self.config.stop_mode);
                tracing::info!("network stopped");
                self.outcome()
            }
            Phase::Finished => self.outcome(),
        }
    }

    /// Blocks until every worker has ended on its own: sources finished,
    /// end of stream reached the sinks, or a fatal failure brought the
    /// network down. Returns that fatal failure, if any.
    pub fn wait(&mut self) -> NetworkResult<()> {
        if self.phase == Phase::Running {
            for idx in self.order.clone() {
                self.join(idx);
            }
            self.phase = Phase::Finished;
            tracing::info!("network finished");
        }
        self.outcome()
    }

    /// Subscribes to every message emitted anywhere in the network. Records
    /// that do not fit into `capacity` are dropped, never blocking a module.
    pub fn tap(&self, capacity: usize) -> Receiver<TapRecord> {
        self.env.taps.subscribe(capacity)
    }

    pub fn handle(&self, name: &str) -> Option<ModuleHandle> {
        self.index
            .get(name)
            .map(|&idx| self.slots[idx].handle.clone())
    }

    /// Handles in the order modules were added.
    pub fn handles(&self) -> Vec<ModuleHandle> {
        self.slots.iter().map(|slot| slot.handle.clone()).collect()
    }

    pub fn registry(&self) -> &Arc<IuRegistry> {
        &self.env.registry
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            modules: self
                .slots
                .iter()
                .map(|slot| ModuleSnapshot::of(&slot.handle))
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| EdgeSnapshot {
                    from: self.slots[edge.from].handle.id().clone(),
                    to: self.slots[edge.to].handle.id().clone(),
                    input: edge.input.to_string(),
                    config: edge.edge.config(),
                    serialized: edge.serialized,
                    depth: edge.edge.len(),
                    closed: edge.edge.is_closed(),
                    metrics: edge.edge.metrics(),
                })
                .collect(),
            live_units: self.env.registry.len(),
            taps_dropped: self.env.taps.dropped(),
        }
    }

    /// Every module connected to `name` through edges in either direction,
    /// `name` included, in the order they were added.
    pub fn discover(&self, name: &str) -> Result<Vec<ModuleId>, WiringError> {
        let start = self.lookup(name)?;
        let mut seen = vec![false; self.slots.len()];
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for edge in &self.edges {
                let next = if edge.from == node {
                    edge.to
                } else if edge.to == node {
                    edge.from
                } else {
                    continue;
                };
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        Ok(self
            .slots
            .iter()
            .zip(seen)
            .filter(|(_, seen)| *seen)
            .map(|(slot, _)| slot.handle.id().clone())
            .collect())
    }

    fn lookup(&self, name: &str) -> Result<usize, WiringError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| WiringError::UnknownModule(name.to_owned()))
    }

    fn ensure_building(&self) -> Result<(), WiringError> {
        match self.phase {
            Phase::Building => Ok(()),
            Phase::Running => Err(WiringError::AlreadyRunning),
            Phase::Finished => Err(WiringError::Finished),
        }
    }

    /// Tears down modules whose workers were never started.
    fn abort_pending(&mut self) {
        for slot in &mut self.slots {
            if let Some(runner) = slot.runner.take() {
                runner.abort();
            }
        }
    }

    /// Stops and joins every started worker, sources first.
    fn halt(&mut self, mode: StopMode) {
        for idx in self.order.clone() {
            self.slots[idx].handle.request_stop(mode);
            self.join(idx);
        }
        self.phase = Phase::Finished;
    }

    fn join(&mut self, idx: usize) {
        let Some(worker) = self.slots[idx].worker.take() else {
            return;
        };
        if worker.join().is_err() {
            tracing::error!(module = %self.slots[idx].handle.id(), "worker panicked");
        }
    }

    fn outcome(&self) -> NetworkResult<()> {
        match self.env.supervisor.fatal() {
            Some(failure) => Err(NetworkError::Fatal(failure)),
            None => Ok(()),
        }
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        if self.phase == Phase::Running {
            tracing::warn!("network dropped while running; abandoning");
            self.halt(StopMode::Abandon);
        }
    }
}

/// Whether some output type of the producer is accepted by some input type
/// of the consumer.
fn compatible(produces: &[PayloadType], accepts: &[PayloadType]) -> bool {
    produces.iter().any(|&produced| {
        accepts
            .iter()
            .any(|&accepted| produced == PayloadType::ANY || accepted.accepts(produced))
    })
}
