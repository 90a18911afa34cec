#![cfg(all(test, not(target_arch = "wasm32")))]
//! Fan-out isolation: a stalled consumer never delays its siblings.

use std::time::Duration;

use network::Network;
use runtime::ModuleError;
use transport::{BufferConfig, OverflowPolicy, TransportError};

use crate::support::{assert_quiet, next, observer, quick_config, scripted, TIMEOUT};

/// Scenario D: with C2's edge full under `block`, P keeps delivering to C1,
/// and C1 observes those messages before C2 is released.
#[test]
fn blocked_sibling_does_not_delay_delivery() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (c1, seen1) = observer("c1");
    net.add_module(c1.boxed()).expect("c1");
    let (c2, seen2) = observer("c2");
    let (c2, gate) = c2.gated();
    net.add_module(c2.boxed()).expect("c2");
    net.connect_with("p", "c1", "in", BufferConfig::blocking(8))
        .expect("edge to c1");
    net.connect_with("p", "c2", "in", BufferConfig::blocking(1))
        .expect("edge to c2");
    net.run().expect("run");

    for text in ["m1", "m2", "m3"] {
        driver.emit(text);
    }

    gate.entered.recv_timeout(TIMEOUT).expect("c2 holds m1");
    assert_eq!(next(&seen1).text(), "m1");
    assert_eq!(next(&seen1).text(), "m2");
    assert_quiet(&seen2, Duration::from_millis(50));

    gate.open();
    let order: Vec<String> = (0..3).map(|_| next(&seen2).text()).collect();
    assert_eq!(order, vec!["m1", "m2", "m3"]);
    assert_eq!(next(&seen1).text(), "m3");

    drop(driver);
    net.wait().expect("wait");
}

/// A full `error` edge costs its consumer messages; the sibling and the
/// producer carry on, and each loss is reported to the producer.
#[test]
fn full_error_edge_only_affects_its_consumer() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (c1, seen1) = observer("c1");
    net.add_module(c1.boxed()).expect("c1");
    let (c2, seen2) = observer("c2");
    let (c2, gate) = c2.gated();
    net.add_module(c2.boxed()).expect("c2");
    net.connect("p", "c1", "in").expect("edge to c1");
    net.connect_with(
        "p",
        "c2",
        "in",
        BufferConfig::new(1, OverflowPolicy::Error),
    )
    .expect("edge to c2");
    let producer = net.handle("p").expect("p");
    let errors = producer.errors();
    net.run().expect("run");

    driver.emit("m0");
    gate.entered.recv_timeout(TIMEOUT).expect("c2 holds m0");
    for n in 1..=5 {
        driver.emit(&format!("m{n}"));
    }

    let texts: Vec<String> = (0..6).map(|_| next(&seen1).text()).collect();
    assert_eq!(texts, vec!["m0", "m1", "m2", "m3", "m4", "m5"]);

    // m1 fits into the edge, m2..m5 are rejected.
    for _ in 0..4 {
        match errors.recv_timeout(TIMEOUT).expect("push error") {
            ModuleError::Push {
                subscriber, source, ..
            } => {
                assert_eq!(subscriber.as_str(), "c2");
                assert_eq!(source, TransportError::BufferFull { capacity: 1 });
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    gate.open();
    let delivered: Vec<String> = (0..2).map(|_| next(&seen2).text()).collect();
    assert_eq!(delivered, vec!["m0", "m1"]);

    drop(driver);
    net.wait().expect("wait");
    assert!(producer.terminal_error().is_none());
    assert_eq!(producer.stats().emitted, 6);
    let edge = &net.snapshot().edges[1];
    assert_eq!(edge.metrics.rejected_full, 4);
}
