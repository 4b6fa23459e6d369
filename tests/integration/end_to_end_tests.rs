//! Full node scenario: capture offline, connect, wait for START, drain.

use crackwatch::app::events::AppEvent;
use crackwatch::config::{AuthorizationScope, NodeConfig};
use crackwatch::credentials::CredentialProfile;
use crackwatch::session::SessionState;

use crate::mock_hw::{MockWifi, Rig};

/// One-minute sampling so the scenario controls exactly when samples land.
fn slow_sampling() -> NodeConfig {
    NodeConfig {
        sample_interval_ms: 60_000,
        ..NodeConfig::default()
    }
}

fn provision(rig: &mut Rig, name: &str) {
    rig.node
        .provision(&CredentialProfile::new(name, "password1").unwrap())
        .unwrap();
}

#[test]
fn offline_samples_are_delivered_in_order_after_start() {
    let mut rig = Rig::with_config(slow_sampling(), MockWifi::new(&["site"], &["site"]));
    rig.node.start(&mut rig.sink);

    // Three samples with no network.
    for t in [0, 60_000, 120_000] {
        rig.tick(t);
    }
    assert_eq!(rig.node.pending(), 3);
    assert!(rig.node.provisioning_required());
    assert!(rig.broker.published.is_empty());

    // Network comes up, broker session opens, nothing is sent yet.
    provision(&mut rig, "site");
    rig.tick(121_000);
    assert!(rig.node.link_up());
    assert_eq!(rig.node.session_state(), SessionState::Locked);
    assert_eq!(rig.broker.subscriptions, ["crackwatch/command"]);
    rig.tick(126_000);
    assert!(rig.broker.published.is_empty());

    // START authorizes; the first drain runs on the same tick.
    rig.broker.deliver("crackwatch/command", b"START");
    rig.tick(127_000);
    assert_eq!(rig.node.session_state(), SessionState::Authorized);
    assert_eq!(
        rig.broker.payloads(),
        [
            r#"{"load_cell":1,"strain_gauge":-1}"#,
            r#"{"load_cell":2,"strain_gauge":-2}"#,
            r#"{"load_cell":3,"strain_gauge":-3}"#,
        ]
    );
    assert!(rig.broker.published.iter().all(|(t, _)| t == "crackwatch/data"));
    assert_eq!(rig.node.pending(), 0);
    assert!(rig.sink.events.contains(&AppEvent::DrainCompleted { sent: 3, remaining: 0 }));
    assert!(rig.leds.link && rig.leds.session);
}

#[test]
fn wrong_payload_or_topic_does_not_authorize() {
    let mut rig = Rig::with_config(slow_sampling(), MockWifi::new(&["site"], &["site"]));
    provision(&mut rig, "site");
    rig.tick(0);
    assert_eq!(rig.node.session_state(), SessionState::Locked);

    rig.broker.deliver("crackwatch/command", b"start");
    rig.broker.deliver("crackwatch/command", b"START ");
    rig.broker.deliver("crackwatch/data", b"START");
    rig.tick(1000);
    assert_eq!(rig.node.session_state(), SessionState::Locked);
    assert!(rig.broker.published.is_empty());
    assert_eq!(rig.sink.count(|e| *e == AppEvent::CommandIgnored), 3);
}

#[test]
fn samples_keep_flowing_once_authorized() {
    let mut rig = Rig::new(MockWifi::new(&["site"], &["site"]));
    provision(&mut rig, "site");
    rig.tick(0);
    rig.broker.deliver("crackwatch/command", b"START");
    rig.run(500, 20_500, 500);
    // 21 samples at 1 Hz, drained every 5 s; at most one interval behind.
    assert_eq!(rig.sensors.reads, 21);
    assert!(rig.broker.published.len() >= 16);
    assert_eq!(rig.broker.published.len() + rig.node.pending(), 21);
}

#[test]
fn boot_scope_keeps_authorization_across_broker_reconnect() {
    let mut rig = Rig::with_config(slow_sampling(), MockWifi::new(&["site"], &["site"]));
    provision(&mut rig, "site");
    rig.tick(0);
    rig.broker.deliver("crackwatch/command", b"START");
    rig.tick(1000);
    assert_eq!(rig.node.session_state(), SessionState::Authorized);

    rig.broker.connected = false;
    rig.tick(2000);
    assert_eq!(rig.node.session_state(), SessionState::Connecting);
    rig.tick(7000);
    assert_eq!(rig.node.session_state(), SessionState::Authorized);
}

#[test]
fn connection_scope_requires_a_fresh_start() {
    let config = NodeConfig {
        authorization_scope: AuthorizationScope::Connection,
        ..slow_sampling()
    };
    let mut rig = Rig::with_config(config, MockWifi::new(&["site"], &["site"]));
    provision(&mut rig, "site");
    rig.tick(0);
    rig.broker.deliver("crackwatch/command", b"START");
    rig.tick(1000);
    assert_eq!(rig.node.session_state(), SessionState::Authorized);

    rig.broker.connected = false;
    rig.tick(2000);
    rig.tick(7000);
    assert_eq!(rig.node.session_state(), SessionState::Locked);
}

#[test]
fn unreachable_broker_retries_on_fixed_delay() {
    let mut rig = Rig::with_config(slow_sampling(), MockWifi::new(&["site"], &["site"]));
    rig.broker.reachable = false;
    provision(&mut rig, "site");
    rig.run(0, 20_000, 1000);
    // Attempts at 0, 5 s, 10 s, 15 s.
    assert_eq!(rig.broker.connects, 4);
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::BrokerRetry(_))), 4);
    assert_eq!(rig.node.session_state(), SessionState::Connecting);
    assert_eq!(rig.node.pending(), 1);
}
