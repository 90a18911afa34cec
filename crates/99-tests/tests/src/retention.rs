#![cfg(all(test, not(target_arch = "wasm32")))]
//! Units that every stage has let go of do not stay alive in the network.

use std::thread;
use std::time::{Duration, Instant};

use iu::UpdateType;
use network::Network;

use crate::support::{next, observer, quick_config, scripted, TIMEOUT};

const UNITS: usize = 500;

#[test]
fn committed_units_are_released() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (consumer, seen) = observer("c");
    net.add_module(consumer.boxed()).expect("c");
    net.connect("p", "c", "in").expect("edge");
    let producer = net.handle("p").expect("p");
    net.run().expect("run");

    for n in 0..UNITS {
        let iu = driver.add(&n.to_string());
        driver.commit(&iu);
    }
    let mut commits = 0;
    for _ in 0..2 * UNITS {
        if next(&seen).update == UpdateType::Commit {
            commits += 1;
        }
    }
    assert_eq!(commits, UNITS);

    // The consumer may still hold its last message for a moment.
    let deadline = Instant::now() + TIMEOUT;
    while net.registry().len() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(net.registry().len(), 0);
    assert!(producer.outputs().is_empty());

    drop(driver);
    net.wait().expect("wait");
    assert_eq!(net.registry().len(), 0);
    assert_eq!(producer.stats().emitted, 2 * UNITS as u64);
}
