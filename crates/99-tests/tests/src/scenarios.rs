#![cfg(all(test, not(target_arch = "wasm32")))]
//! End-to-end update protocol scenarios between a producer P and a
//! subscribed consumer C.

use std::time::Duration;

use iu::{IuStatus, UpdateType};
use network::{Network, NetworkConfig};
use runtime::ModuleError;

use crate::support::{assert_quiet, next, observer, quick_config, scripted, TIMEOUT};

/// Scenario A: an ADD reaches the consumer exactly once, active.
#[test]
fn add_is_observed_once_and_active() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (consumer, seen) = observer("c");
    net.add_module(consumer.boxed()).expect("c");
    net.connect("p", "c", "in").expect("edge");
    net.run().expect("run");

    let iu1 = driver.add("iu1");
    let observed = next(&seen);
    assert_eq!(observed.iu.id(), iu1.id());
    assert_eq!(observed.update, UpdateType::Add);
    assert_eq!(observed.status, IuStatus::Active);
    assert_eq!(observed.input, "in");
    assert!(observed.iu.ptr_eq(&iu1), "in-process edges share the unit");

    drop(driver);
    net.wait().expect("wait");
    assert_quiet(&seen, Duration::from_millis(20));
}

/// Scenario B: a later REVOKE flips the status the consumer sees, without
/// a second ADD.
#[test]
fn revoke_follows_add_without_readding() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (consumer, seen) = observer("c");
    net.add_module(consumer.boxed()).expect("c");
    net.connect("p", "c", "in").expect("edge");
    net.run().expect("run");

    let iu1 = driver.add("iu1");
    assert_eq!(next(&seen).update, UpdateType::Add);
    driver.revoke(&iu1);
    let revoked = next(&seen);
    assert_eq!(revoked.iu.id(), iu1.id());
    assert_eq!(revoked.update, UpdateType::Revoke);
    assert_eq!(revoked.status, IuStatus::Revoked);

    drop(driver);
    net.wait().expect("wait");
    let adds = seen
        .try_iter()
        .filter(|observed| observed.update == UpdateType::Add)
        .count();
    assert_eq!(adds, 0);
    assert!(iu1.is_revoked());
}

/// Scenario C: grounding in a revoked unit is flagged on the producer's
/// error channel, and the unit is still delivered.
#[test]
fn grounding_in_revoked_unit_is_flagged_not_rejected() {
    let mut net = Network::new(NetworkConfig {
        validate_grounding: true,
        ..quick_config()
    });
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (consumer, seen) = observer("c");
    net.add_module(consumer.boxed()).expect("c");
    net.connect("p", "c", "in").expect("edge");
    let errors = net.handle("p").expect("p").errors();
    net.run().expect("run");

    let iu1 = driver.add("iu1");
    driver.revoke(&iu1);
    let iu2 = driver.add_grounded("iu2", &[iu1.clone()]);

    let observed: Vec<_> = (0..3).map(|_| next(&seen)).collect();
    assert_eq!(observed[2].iu.id(), iu2.id());
    assert_eq!(observed[2].update, UpdateType::Add);
    assert!(iu2.is_active());

    match errors.recv_timeout(TIMEOUT).expect("violation reported") {
        ModuleError::GroundingViolation { id, revoked, .. } => {
            assert_eq!(id, iu2.id());
            assert_eq!(revoked, iu1.id());
        }
        other => panic!("unexpected error {other:?}"),
    }

    drop(driver);
    net.wait().expect("wait");
    assert!(errors.try_iter().next().is_none(), "flagged once");
}

/// Committing is final: a later REVOKE is dropped at the producer.
#[test]
fn revoke_after_commit_is_rejected() {
    let mut net = Network::new(quick_config());
    let (source, driver) = scripted("p");
    net.add_module(source).expect("p");
    let (consumer, seen) = observer("c");
    net.add_module(consumer.boxed()).expect("c");
    net.connect("p", "c", "in").expect("edge");
    let errors = net.handle("p").expect("p").errors();
    net.run().expect("run");

    let iu1 = driver.add("iu1");
    driver.commit(&iu1);
    driver.revoke(&iu1);

    assert_eq!(next(&seen).update, UpdateType::Add);
    let committed = next(&seen);
    assert_eq!(committed.update, UpdateType::Commit);
    assert_eq!(committed.status, IuStatus::Committed);
    assert!(matches!(
        errors.recv_timeout(TIMEOUT).expect("transition error"),
        ModuleError::Transition { .. }
    ));

    drop(driver);
    net.wait().expect("wait");
    assert!(seen.try_iter().next().is_none());
    assert!(iu1.is_committed());
}
