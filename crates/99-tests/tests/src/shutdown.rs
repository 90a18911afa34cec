#![cfg(all(test, not(target_arch = "wasm32")))]
//! End of stream, graceful stop, and abandon.

use std::thread;
use std::time::{Duration, Instant};

use iu::{Payload, PayloadType, Text, UpdateMessage, UpdateType};
use network::{Network, NetworkConfig};
use runtime::{Module, ModuleContext, ModuleState, StopMode};

use crate::support::{next, observer, quick_config, scripted, Observed, TIMEOUT};

/// Re-publishes every added text in upper case, grounded in the original.
struct Shout;

impl Module for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    fn input_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn output_types(&self) -> Vec<PayloadType> {
        vec![Text::TYPE]
    }

    fn process_update(
        &mut self,
        _input: &str,
        message: &UpdateMessage,
        ctx: &mut ModuleContext,
    ) -> anyhow::Result<Option<UpdateMessage>> {
        let mut out = UpdateMessage::new();
        for source in message.added() {
            let Some(text) = source.payload_as::<Text>() else {
                continue;
            };
            let loud = ctx
                .create_iu(Text::new(text.text.to_uppercase()))
                .grounded_in(source)
                .build();
            out.push(loud, UpdateType::Add)?;
        }
        Ok((!out.is_empty()).then_some(out))
    }
}

/// A finished source ends the whole chain without an explicit stop.
#[test]
fn end_of_stream_cascades_through_the_chain() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    net.add_module(Box::new(Shout)).expect("shout");
    let (sink, seen) = observer("c");
    net.add_module(sink.boxed()).expect("c");
    net.connect("p", "shout", "in").expect("edge");
    net.connect("shout", "c", "in").expect("edge");
    net.run().expect("run");

    let originals: Vec<_> = ["a", "b", "c"].iter().map(|t| driver.add(t)).collect();
    drop(driver);
    net.wait().expect("wait");

    let observed: Vec<Observed> = seen.try_iter().collect();
    assert_eq!(
        observed.iter().map(Observed::text).collect::<Vec<_>>(),
        vec!["A", "B", "C"]
    );
    for (loud, original) in observed.iter().zip(&originals) {
        assert!(loud.iu.is_grounded_in(original.id()));
        assert_eq!(loud.iu.creator().as_str(), "shout");
    }

    let snapshot = net.snapshot();
    assert!(snapshot
        .modules
        .iter()
        .all(|module| module.state == ModuleState::TornDown));
    assert!(snapshot.edges.iter().all(|edge| edge.closed && edge.depth == 0));
    net.stop().expect("stop after wait");
}

/// Parks three messages at a gated consumer and stops the network with
/// `mode`; returns how many of them the consumer processed.
fn processed_after_stop(mode: StopMode) -> usize {
    let mut net = Network::new(NetworkConfig {
        stop_mode: mode,
        ..quick_config()
    });
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (sink, seen) = observer("c");
    let (sink, gate) = sink.gated();
    net.add_module(sink.boxed()).expect("c");
    net.connect("p", "c", "in").expect("edge");
    net.run().expect("run");

    for text in ["m1", "m2", "m3"] {
        driver.emit(text);
    }
    gate.entered.recv_timeout(TIMEOUT).expect("c holds m1");
    let deadline = Instant::now() + TIMEOUT;
    while net.snapshot().edges[0].depth < 2 {
        assert!(Instant::now() < deadline, "m2 and m3 never queued");
        thread::sleep(Duration::from_millis(1));
    }

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        gate.open();
    });
    net.stop().expect("stop");
    opener.join().expect("opener");

    assert!(net
        .handles()
        .iter()
        .all(|handle| handle.state() == ModuleState::TornDown));
    drop(driver);
    seen.try_iter().count()
}

#[test]
fn drain_processes_pending_input() {
    assert_eq!(processed_after_stop(StopMode::Drain), 3);
}

#[test]
fn abandon_discards_pending_input() {
    assert_eq!(processed_after_stop(StopMode::Abandon), 1);
}

/// Stopping a module directly ends it and, through end of stream, its
/// consumers, while its own producer keeps running.
#[test]
fn stopping_one_module_closes_its_edges() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    net.add_module(Box::new(Shout)).expect("shout");
    let (sink, seen) = observer("c");
    net.add_module(sink.boxed()).expect("c");
    net.connect("p", "shout", "in").expect("edge");
    net.connect("shout", "c", "in").expect("edge");
    net.run().expect("run");

    driver.add("before");
    assert_eq!(next(&seen).text(), "BEFORE");

    let shout = net.handle("shout").expect("shout");
    shout.request_stop(StopMode::Drain);
    let consumer = net.handle("c").expect("c");
    let deadline = Instant::now() + TIMEOUT;
    while consumer.state() != ModuleState::TornDown {
        assert!(Instant::now() < deadline, "consumer never ended");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(shout.state(), ModuleState::TornDown);
    assert_eq!(net.handle("p").expect("p").state(), ModuleState::Running);

    drop(driver);
    net.wait().expect("wait");
}
