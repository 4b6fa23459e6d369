//! A failed publish stops the pass and the same record heads the next one.

use crackwatch::app::events::AppEvent;
use crackwatch::config::NodeConfig;
use crackwatch::credentials::CredentialProfile;

use crate::mock_hw::{MockWifi, Rig};

fn authorized_rig(config: NodeConfig) -> Rig {
    let mut rig = Rig::with_config(config, MockWifi::new(&["site"], &["site"]));
    rig.node
        .provision(&CredentialProfile::new("site", "password1").unwrap())
        .unwrap();
    rig
}

#[test]
fn failed_record_is_retried_first() {
    let config = NodeConfig {
        sample_interval_ms: 60_000,
        ..NodeConfig::default()
    };
    let mut rig = authorized_rig(config);
    // Capture three samples before the broker session authorizes.
    rig.wifi.accepting.clear();
    for t in [0, 60_000, 120_000] {
        rig.tick(t);
    }
    rig.wifi.accepting.push("site");

    rig.broker.publish_budget = Some(1);
    rig.tick(130_000); // link up, Locked
    rig.broker.deliver("crackwatch/command", b"START");
    rig.tick(131_000); // Authorized, first pass
    assert_eq!(rig.broker.payloads(), [r#"{"load_cell":1,"strain_gauge":-1}"#]);
    assert_eq!(rig.node.pending(), 2);
    assert!(rig.sink.events.contains(&AppEvent::TransmitFailed { seq: 1 }));

    rig.broker.publish_budget = None;
    rig.tick(136_000);
    assert_eq!(
        rig.broker.payloads(),
        [
            r#"{"load_cell":1,"strain_gauge":-1}"#,
            r#"{"load_cell":2,"strain_gauge":-2}"#,
            r#"{"load_cell":3,"strain_gauge":-3}"#,
        ]
    );
    assert_eq!(rig.node.pending(), 0);
}

#[test]
fn capped_pass_finishes_backlog_on_following_ticks() {
    let config = NodeConfig {
        max_records_per_pass: 2,
        ..NodeConfig::default()
    };
    let mut rig = authorized_rig(config);
    rig.wifi.accepting.clear();
    rig.run(0, 5000, 1000);
    assert_eq!(rig.node.pending(), 5);
    rig.wifi.accepting.push("site");

    rig.broker.deliver("crackwatch/command", b"START");
    rig.tick(10_000); // sixth sample, link up, Authorized, first two records
    assert_eq!(rig.broker.published.len(), 2);
    rig.tick(10_020);
    assert_eq!(rig.broker.published.len(), 4);
    rig.tick(10_040);
    assert_eq!(rig.broker.published.len(), 6);
    assert_eq!(rig.node.pending(), 0);
    assert_eq!(rig.node.queue().stats().log_bytes, 0);

    let order: Vec<i32> = rig
        .broker
        .payloads()
        .iter()
        .map(|p| serde_json::from_str::<serde_json::Value>(p).unwrap()["load_cell"].as_i64().unwrap() as i32)
        .collect();
    assert_eq!(order, [1, 2, 3, 4, 5, 6]);
}
