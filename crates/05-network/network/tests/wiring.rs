//! Network wiring, setup ordering and introspection.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use iu::{Audio, Payload, PayloadType, Text, UpdateMessage, UpdateType};
use network::{
    ModuleSpec, Network, NetworkConfig, NetworkError, TopologyConfig, WiringError,
};
use runtime::{FailurePhase, Module, ModuleContext, ModuleState};
use transport::{Buffer, BufferConfig, Channel, Doorbell};

/// Emits `count` text units, then finishes.
struct Words {
    name: String,
    count: usize,
}

impl Module for Words {
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
        if self.count == 0 {
            ctx.finish();
            return Ok(None);
        }
        self.count -= 1;
        let iu = ctx.create_iu(Text::new(format!("w{}", self.count))).build();
        Ok(Some(UpdateMessage::from_iu(iu, UpdateType::Add)?))
    }
}

/// Records setup order and every text it receives.
struct Sink {
    name: String,
    accepts: PayloadType,
    setups: Option<Sender<String>>,
    seen: Option<Sender<String>>,
    fail_setup: bool,
}

impl Sink {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            accepts: Text::TYPE,
            setups: None,
            seen: None,
            fail_setup: false,
        }
    }
}

impl Module for Sink {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![self.accepts]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn setup(&mut self, _ctx: &mut ModuleContext) -> anyhow::Result<()> {
        if let Some(setups) = &self.setups {
            setups.send(self.name.clone())?;
        }
        if self.fail_setup {
            anyhow::bail!("device unavailable");
        }
        Ok(())
    }

    fn process_update(
        &mut self,
        _input: &str,
        message: &UpdateMessage,
        _ctx: &mut ModuleContext,
    ) -> anyhow::Result<Option<UpdateMessage>> {
        if let Some(seen) = &self.seen {
            for iu in message.added() {
                if let Some(text) = iu.payload_as::<Text>() {
                    seen.send(text.text.clone())?;
                }
            }
        }
        Ok(None)
    }
}

fn words(name: &str, count: usize) -> Box<dyn Module> {
    Box::new(Words {
        name: name.to_owned(),
        count,
    })
}

fn quick() -> NetworkConfig {
    NetworkConfig {
        idle_backoff_ms: 1,
        ..NetworkConfig::default()
    }
}

#[test]
fn wiring_errors_are_synchronous() {
    let mut net = Network::new(quick());
    net.add_module(words("asr", 1)).expect("asr");
    net.add_module(Box::new(Sink::new("out"))).expect("out");
    let mut audio_only = Sink::new("player");
    audio_only.accepts = Audio::TYPE;
    net.add_module(Box::new(audio_only)).expect("player");

    assert_eq!(
        net.add_module(words("asr", 1)).unwrap_err(),
        WiringError::DuplicateModule("asr".into())
    );
    assert_eq!(
        net.connect("asr", "nobody", "in").unwrap_err(),
        WiringError::UnknownModule("nobody".to_owned())
    );
    assert_eq!(
        net.connect("out", "out", "in").unwrap_err(),
        WiringError::SelfLoop("out".into())
    );
    assert!(matches!(
        net.connect("asr", "player", "in").unwrap_err(),
        WiringError::IncompatibleTypes { .. }
    ));
    assert!(matches!(
        net.connect_with("asr", "out", "in", BufferConfig::blocking(0))
            .unwrap_err(),
        WiringError::InvalidEdge(_)
    ));

    net.connect("asr", "out", "in").expect("first edge");
    assert_eq!(
        net.connect("asr", "out", "in").unwrap_err(),
        WiringError::DuplicateInput {
            consumer: "out".into(),
            input: "in".to_owned(),
        }
    );
}

#[test]
fn caller_built_edges_must_ring_the_consumer() {
    let mut net = Network::new(quick());
    net.add_module(words("asr", 1)).expect("asr");
    net.add_module(Box::new(Sink::new("out"))).expect("out");

    let detached = net.connect_channel("asr", "out", "a", |_bell| {
        let edge: Arc<dyn Channel<UpdateMessage>> = Arc::new(Buffer::with_doorbell(
            BufferConfig::default(),
            Arc::new(Doorbell::new()),
        )?);
        Ok(edge)
    });
    assert!(matches!(detached, Err(WiringError::DetachedEdge { .. })));

    net.connect_channel("asr", "out", "b", |bell| {
        let edge: Arc<dyn Channel<UpdateMessage>> =
            Arc::new(Buffer::with_doorbell(BufferConfig::blocking(4), bell)?);
        Ok(edge)
    })
    .expect("attached edge");
    assert_eq!(net.snapshot().edges.len(), 1);
}

/// Consumers are set up before their producers.
#[test]
fn setup_runs_sinks_first_and_topology_freezes() {
    let (setups_tx, setups_rx) = unbounded();
    let mut net = Network::new(quick());
    for name in ["late", "early", "middle"] {
        let mut sink = Sink::new(name);
        sink.setups = Some(setups_tx.clone());
        net.add_module(Box::new(sink)).expect("add");
    }
    net.connect("early", "middle", "in").expect("edge");
    net.connect("middle", "late", "in").expect("edge");

    net.run().expect("run");
    let order: Vec<String> = setups_rx.try_iter().collect();
    assert_eq!(order, vec!["late", "middle", "early"]);
    assert_eq!(
        net.connect("late", "early", "back").unwrap_err(),
        WiringError::AlreadyRunning
    );
    assert!(net
        .handles()
        .iter()
        .all(|handle| handle.state() == ModuleState::Running));

    net.stop().expect("stop");
    assert!(net
        .handles()
        .iter()
        .all(|handle| handle.state() == ModuleState::TornDown));
    assert_eq!(
        net.add_module(Box::new(Sink::new("another"))).unwrap_err(),
        WiringError::Finished
    );
}

/// A failing setup tears down every module and surfaces synchronously.
#[test]
fn setup_failure_tears_everything_down() {
    let mut net = Network::new(quick());
    net.add_module(words("asr", 5)).expect("asr");
    let mut broken = Sink::new("broken");
    broken.fail_setup = true;
    net.add_module(Box::new(broken)).expect("broken");
    net.add_module(Box::new(Sink::new("out"))).expect("out");
    net.connect("asr", "broken", "in").expect("edge");
    net.connect("broken", "out", "in").expect("edge");

    match net.run() {
        Err(NetworkError::Setup(failure)) => {
            assert_eq!(failure.module.as_str(), "broken");
            assert_eq!(failure.phase, FailurePhase::Setup);
            assert!(failure.message.contains("device unavailable"));
        }
        other => panic!("expected setup failure, got {other:?}"),
    }
    assert!(!net.is_running());
    assert!(net
        .handles()
        .iter()
        .all(|handle| handle.state() == ModuleState::TornDown));
    assert!(net.snapshot().edges.iter().all(|edge| edge.closed));
}

#[test]
fn discover_returns_the_connected_component() {
    let mut net = Network::new(quick());
    net.add_module(words("a", 1)).expect("a");
    net.add_module(Box::new(Sink::new("b"))).expect("b");
    net.add_module(words("c", 1)).expect("c");
    net.add_module(Box::new(Sink::new("d"))).expect("d");
    net.add_module(Box::new(Sink::new("lonely"))).expect("lonely");
    net.connect("a", "b", "in").expect("edge");
    net.connect("c", "d", "in").expect("edge");
    net.connect("b", "d", "more").expect("edge");

    let names = |ids: Vec<iu::ModuleId>| -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    };
    assert_eq!(
        names(net.discover("d").expect("d")),
        vec!["a", "b", "c", "d"]
    );
    assert_eq!(names(net.discover("lonely").expect("lonely")), vec!["lonely"]);
    assert_eq!(
        net.discover("ghost").unwrap_err(),
        WiringError::UnknownModule("ghost".to_owned())
    );
}

/// A topology with a serialized edge runs to completion and its snapshot
/// serializes to JSON.
#[test]
fn topology_runs_to_end_of_stream() {
    let topology = TopologyConfig::from_json(
        r#"{
            "network": { "idle_backoff_ms": 1 },
            "modules": [
                { "name": "asr", "kind": "words", "options": { "count": 6 } },
                { "name": "out", "kind": "sink" }
            ],
            "edges": [
                { "from": "asr", "to": "out", "input": "words", "capacity": 2, "serialized": true }
            ]
        }"#,
    )
    .expect("topology");

    let (seen_tx, seen_rx) = unbounded();
    let mut net = Network::from_topology(&topology, |spec: &ModuleSpec| {
        let module: Box<dyn Module> = match spec.kind.as_str() {
            "words" => {
                let count = spec.options["count"].as_u64().unwrap_or(1) as usize;
                words(&spec.name, count)
            }
            "sink" => {
                let mut sink = Sink::new(&spec.name);
                sink.seen = Some(seen_tx.clone());
                Box::new(sink)
            }
            other => return Err(WiringError::UnknownKind(other.to_owned()).into()),
        };
        Ok(module)
    })
    .expect("network");
    let taps = net.tap(64);

    net.run().expect("run");
    net.wait().expect("wait");

    let seen: Vec<String> = seen_rx.try_iter().collect();
    assert_eq!(seen, vec!["w5", "w4", "w3", "w2", "w1", "w0"]);
    assert_eq!(taps.try_iter().count(), 6);

    let snapshot = net.snapshot();
    let edge = &snapshot.edges[0];
    assert!(edge.serialized && edge.closed);
    assert_eq!(edge.metrics.accepted, 6);
    assert_eq!(snapshot.module("asr").expect("asr").outputs.len(), 6);
    assert_eq!(
        snapshot.module("out").expect("out").state,
        ModuleState::TornDown
    );
    let json = serde_json::to_value(&snapshot).expect("json");
    assert_eq!(json["edges"][0]["config"]["capacity"], 2);
    assert_eq!(json["modules"][0]["state"], "torn_down");
}

#[test]
fn unknown_kind_names_the_module() {
    let topology = TopologyConfig::from_json(
        r#"{ "modules": [ { "name": "x", "kind": "mystery" } ] }"#,
    )
    .expect("topology");
    let err = Network::from_topology(&topology, |spec| {
        Err(WiringError::UnknownKind(spec.kind.clone()).into())
    })
    .err()
    .expect("error");
    match err {
        NetworkError::Topology { module, source } => {
            assert_eq!(module, "x");
            assert!(source.to_string().contains("mystery"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

/// Waiting on a network whose sources never finish is bounded by `stop`.
#[test]
fn stop_ends_an_endless_pipeline() {
    let mut net = Network::new(quick());
    net.add_module(words("asr", usize::MAX)).expect("asr");
    net.add_module(Box::new(Sink::new("out"))).expect("out");
    net.connect("asr", "out", "in").expect("edge");
    net.run().expect("run");
    std::thread::sleep(Duration::from_millis(20));
    net.stop().expect("stop");
    let snapshot = net.snapshot();
    assert!(snapshot
        .modules
        .iter()
        .all(|module| module.state == ModuleState::TornDown));
    assert!(snapshot.module("out").expect("out").stats.received > 0);
}
