#![cfg(all(test, not(target_arch = "wasm32")))]
//! Isolated versus fatal module failures.

use network::{Network, NetworkConfig, NetworkError};
use runtime::{FailurePhase, FailurePolicy, ModuleState};

use crate::support::{next, observer, quick_config, scripted, Failure};

/// Under `isolate` a failing consumer stops alone; its sibling keeps
/// receiving and the network finishes cleanly.
#[test]
fn isolated_failure_degrades_the_pipeline() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (broken, _) = observer("broken");
    net.add_module(broken.failing(Failure::Error).boxed())
        .expect("broken");
    let (healthy, seen) = observer("healthy");
    net.add_module(healthy.boxed()).expect("healthy");
    net.connect("p", "broken", "in").expect("edge");
    net.connect("p", "healthy", "in").expect("edge");
    net.run().expect("run");

    for n in 0..5 {
        driver.add(&format!("m{n}"));
    }
    let texts: Vec<String> = (0..5).map(|_| next(&seen).text()).collect();
    assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4"]);

    drop(driver);
    net.wait().expect("isolated failures do not fail the network");

    let broken = net.handle("broken").expect("broken");
    let failure = broken.terminal_error().expect("terminal error");
    assert_eq!(failure.phase, FailurePhase::Process);
    assert!(failure.message.contains("broken refuses input"));
    assert_eq!(broken.state(), ModuleState::TornDown);
    assert!(net.handle("healthy").expect("healthy").terminal_error().is_none());
}

/// A panic is contained like an error and keeps its message.
#[test]
fn panics_become_terminal_errors() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (broken, _) = observer("broken");
    net.add_module(broken.failing(Failure::Panic).boxed())
        .expect("broken");
    net.connect("p", "broken", "in").expect("edge");
    net.run().expect("run");

    driver.add("boom");
    drop(driver);
    net.wait().expect("wait");

    let failure = net
        .handle("broken")
        .expect("broken")
        .terminal_error()
        .expect("terminal error");
    assert!(failure.message.contains("broken lost its state"));
    assert_eq!(
        net.snapshot()
            .module("broken")
            .expect("broken")
            .terminal_error
            .as_ref()
            .map(|failure| failure.phase),
        Some(FailurePhase::Process)
    );
}

/// Under `fatal` the first failure brings every module down and surfaces
/// from `wait`, even though the source never finished.
#[test]
fn fatal_failure_stops_the_network() {
    let mut net = Network::new(NetworkConfig {
        failure_policy: FailurePolicy::Fatal,
        ..quick_config()
    });
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (broken, _) = observer("broken");
    net.add_module(broken.failing(Failure::Error).boxed())
        .expect("broken");
    let (healthy, _seen) = observer("healthy");
    net.add_module(healthy.boxed()).expect("healthy");
    net.connect("p", "broken", "in").expect("edge");
    net.connect("p", "healthy", "in").expect("edge");
    net.run().expect("run");

    driver.add("trigger");
    match net.wait() {
        Err(NetworkError::Fatal(failure)) => assert_eq!(failure.module.as_str(), "broken"),
        other => panic!("expected a fatal failure, got {other:?}"),
    }
    assert!(net
        .handles()
        .iter()
        .all(|handle| handle.state() == ModuleState::TornDown));
    assert!(matches!(net.stop(), Err(NetworkError::Fatal(_))));
    drop(driver);
}
