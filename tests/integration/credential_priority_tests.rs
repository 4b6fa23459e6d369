//! Stored networks are tried in slot order; the first success wins.

use crackwatch::app::events::AppEvent;
use crackwatch::credentials::CredentialProfile;

use crate::mock_hw::{MockWifi, Rig};

fn provision_all(rig: &mut Rig, names: &[&str]) {
    for name in names {
        rig.node
            .provision(&CredentialProfile::new(name, "password1").unwrap())
            .unwrap();
    }
}

#[test]
fn lowest_slot_that_associates_wins() {
    // Slot 0 is visible but refuses, slot 1 is not visible, slot 2 works.
    let wifi = MockWifi::new(&["gamma", "alpha", "other"], &["gamma"]);
    let mut rig = Rig::new(wifi);
    provision_all(&mut rig, &["alpha", "beta", "gamma"]);
    rig.tick(0);

    assert_eq!(rig.wifi.attempts, ["alpha", "gamma"]);
    assert!(rig.node.link_up());
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::NetworkUp { slot: 2, name } if name.as_str() == "gamma"
    )));
}

#[test]
fn first_match_stops_the_sequence() {
    let wifi = MockWifi::new(&["alpha", "beta"], &["alpha", "beta"]);
    let mut rig = Rig::new(wifi);
    provision_all(&mut rig, &["beta", "alpha"]);
    rig.tick(0);
    assert_eq!(rig.wifi.attempts, ["beta"]);
}

#[test]
fn nothing_matching_retries_on_the_wifi_cadence() {
    let wifi = MockWifi::new(&["elsewhere"], &[]);
    let mut rig = Rig::new(wifi);
    provision_all(&mut rig, &["alpha"]);
    rig.run(0, 25_000, 1000);

    assert!(rig.wifi.attempts.is_empty());
    assert!(rig.node.provisioning_required());
    assert_eq!(rig.sink.count(|e| *e == AppEvent::ProvisioningRequired), 1);
    // Capture never waited for the network.
    assert_eq!(rig.node.pending(), 25);

    rig.wifi.visible.push("alpha");
    rig.wifi.accepting.push("alpha");
    rig.run(25_000, 31_000, 1000);
    assert!(rig.node.link_up());
    assert!(!rig.node.provisioning_required());
}

#[test]
fn lost_link_reconnects_immediately() {
    let wifi = MockWifi::new(&["alpha"], &["alpha"]);
    let mut rig = Rig::new(wifi);
    provision_all(&mut rig, &["alpha"]);
    rig.tick(0);
    rig.wifi.drop_link();
    rig.tick(500);
    assert!(rig.node.link_up());
    assert_eq!(rig.wifi.attempts, ["alpha", "alpha"]);
    assert!(rig.sink.events.contains(&AppEvent::NetworkDown));
}

#[test]
fn provisioning_rejects_duplicates_and_overflow() {
    let mut rig = Rig::new(MockWifi::default());
    provision_all(&mut rig, &["a", "b", "c", "d", "e"]);
    // Same name overwrites its own slot.
    assert_eq!(
        rig.node
            .provision(&CredentialProfile::new("c", "newsecret").unwrap())
            .unwrap(),
        2
    );
    assert!(rig
        .node
        .provision(&CredentialProfile::new("f", "password1").unwrap())
        .is_err());

    rig.node.forget_networks().unwrap();
    assert_eq!(rig.node.credentials().profiles().count(), 0);
}
