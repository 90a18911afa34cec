#![cfg(all(test, not(target_arch = "wasm32")))]
//! Serialized edges inside a running network.

use std::sync::Arc;

use iu::{IuStatus, UpdateType};
use network::Network;
use transport::BufferConfig;
use transport_codecs::PayloadRegistry;

use crate::support::{next, observer, quick_config, scripted};

fn serialized_pair() -> (Network, crate::support::Driver, crossbeam_channel::Receiver<crate::support::Observed>) {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (sink, seen) = observer("c");
    net.add_module(sink.boxed()).expect("c");
    net.connect_serialized(
        "p",
        "c",
        "in",
        BufferConfig::blocking(4),
        Arc::new(PayloadRegistry::standard()),
    )
    .expect("edge");
    net.run().expect("run");
    (net, driver, seen)
}

/// The consumer works on mirrors: later status changes land on the same
/// mirror, and grounding resolves to mirrors too.
#[test]
fn mirrors_track_status_and_grounding() {
    let (mut net, driver, seen) = serialized_pair();

    let iu1 = driver.add("iu1");
    let mirror1 = next(&seen);
    assert_eq!(mirror1.text(), "iu1");
    assert_ne!(mirror1.iu.id(), iu1.id());
    assert_eq!(mirror1.iu.creator().as_str(), "p");

    let iu2 = driver.add_grounded("iu2", &[iu1.clone()]);
    let mirror2 = next(&seen);
    assert!(mirror2.iu.is_grounded_in(mirror1.iu.id()));
    assert_eq!(mirror2.iu.previous_id(), Some(mirror1.iu.id()));

    driver.revoke(&iu1);
    let revoked = next(&seen);
    assert_eq!(revoked.update, UpdateType::Revoke);
    assert_eq!(revoked.iu.id(), mirror1.iu.id());
    assert_eq!(revoked.status, IuStatus::Revoked);
    assert!(mirror1.iu.is_revoked());

    driver.commit(&iu2);
    assert_eq!(next(&seen).status, IuStatus::Committed);
    assert!(mirror2.iu.is_committed());

    drop(driver);
    net.wait().expect("wait");
}

/// Per-edge FIFO holds across the serialized hop.
#[test]
fn serialized_edge_preserves_order() {
    let (mut net, driver, seen) = serialized_pair();
    for n in 0..200 {
        driver.emit(&format!("m{n}"));
    }
    let texts: Vec<String> = (0..200).map(|_| next(&seen).text()).collect();
    let expected: Vec<String> = (0..200).map(|n| format!("m{n}")).collect();
    assert_eq!(texts, expected);
    drop(driver);
    net.wait().expect("wait");
    assert_eq!(net.snapshot().edges[0].metrics.accepted, 200);
}
