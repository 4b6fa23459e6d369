//! A node with no stored network gets one from the build or the console.

use std::time::Duration;

use crackwatch::adapters::console;
use crackwatch::app::commands::ConsoleCommand;
use crackwatch::app::events::AppEvent;
use crackwatch::credentials::CredentialProfile;

use crate::mock_hw::{MockWifi, Rig};

fn network_up(rig: &Rig) -> bool {
    rig.sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::NetworkUp { name, .. } if name.as_str() == "site"))
}

#[test]
fn seeded_network_brings_fresh_node_online() {
    let mut rig = Rig::new(MockWifi::new(&["site"], &["site"]));
    let seeded = rig
        .node
        .seed_network(&CredentialProfile::new("site", "password1").unwrap())
        .unwrap();
    assert!(seeded);
    rig.tick(0);
    assert!(network_up(&rig));
    assert!(!rig.node.provisioning_required());
}

#[test]
fn seed_does_not_override_provisioned_networks() {
    let mut rig = Rig::new(MockWifi::new(&["site", "lab"], &["site", "lab"]));
    rig.node
        .provision(&CredentialProfile::new("lab", "password1").unwrap())
        .unwrap();
    let seeded = rig
        .node
        .seed_network(&CredentialProfile::new("site", "password1").unwrap())
        .unwrap();
    assert!(!seeded);
    rig.tick(0);
    assert_eq!(rig.wifi.attempts, ["lab"]);
}

#[test]
fn console_line_recovers_from_provisioning_required() {
    let mut rig = Rig::new(MockWifi::new(&["site"], &["site"]));
    rig.tick(0);
    assert!(rig.node.provisioning_required());
    assert_eq!(rig.sink.count(|e| *e == AppEvent::ProvisioningRequired), 1);

    let rx = console::spawn(std::io::Cursor::new(b"WIFI site,password1\r\n".to_vec())).unwrap();
    let cmd = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(cmd, ConsoleCommand::Provision(_)));
    rig.node.apply_console(&cmd).unwrap();

    // No need to wait out the WiFi retry interval.
    rig.tick(100);
    assert!(rig.node.link_up());
    assert!(network_up(&rig));
}
