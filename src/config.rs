//! Node configuration parameters
//!
//! All tunable parameters for the Crackwatch node.  The defaults below are
//! the compiled-in values; a validated copy can be persisted to NVS and is
//! loaded at boot by [`ConfigPort`](crate::app::ports::ConfigPort).

use heapless::String;
use serde::{Deserialize, Serialize};

/// Whether a received `START` survives a broker reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationScope {
    /// Authorization lasts until the next reboot (reconnects keep it).
    Boot,
    /// Authorization is dropped whenever the broker session is lost.
    Connection,
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Broker ---
    /// Broker host name or IP address.
    pub broker_host: String<64>,
    /// Broker TCP port (TLS).
    pub broker_port: u16,
    /// Broker account user name.
    pub broker_username: String<32>,
    /// Broker account password.
    pub broker_password: String<64>,
    /// Topic every drained sample is published to.
    pub telemetry_topic: String<64>,
    /// Topic subscribed to for the authorization command.
    pub command_topic: String<64>,
    /// Exact payload that authorizes transmission.
    pub start_token: String<16>,
    /// See [`AuthorizationScope`].
    pub authorization_scope: AuthorizationScope,

    // --- Timing ---
    /// Sensor sampling period (milliseconds).
    pub sample_interval_ms: u32,
    /// Minimum gap between two drain passes (milliseconds).
    pub send_interval_ms: u32,
    /// Fixed delay between broker connect attempts (milliseconds).
    pub reconnect_delay_ms: u32,
    /// Per-profile WiFi association timeout (milliseconds).
    pub association_timeout_ms: u32,
    /// Delay between full scan-and-match passes while offline (milliseconds).
    pub wifi_retry_interval_ms: u32,
    /// Delay between append probes while sampling is halted (milliseconds).
    pub halt_retry_ms: u32,

    // --- Sampling ---
    /// Raw conversions averaged into one reading per channel.
    pub samples_per_reading: u8,
    /// Settle time before taring the sensors at boot (milliseconds).
    pub tare_settle_ms: u32,

    // --- Queue ---
    /// Upper bound on the sample log size (bytes).
    pub queue_capacity_bytes: u64,
    /// Records published per drain pass at most.
    pub max_records_per_pass: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Broker
            broker_host: str_field("broker.crackwatch.local"),
            broker_port: 8883,
            broker_username: str_field("crackwatch"),
            broker_password: str_field("change-me"),
            telemetry_topic: str_field("crackwatch/data"),
            command_topic: str_field("crackwatch/command"),
            start_token: str_field("START"),
            authorization_scope: AuthorizationScope::Boot,

            // Timing
            sample_interval_ms: 1000,
            send_interval_ms: 5000,
            reconnect_delay_ms: 5000,
            association_timeout_ms: 5000,
            wifi_retry_interval_ms: 10_000,
            halt_retry_ms: 10_000,

            // Sampling
            samples_per_reading: 5,
            tare_settle_ms: 2000,

            // Queue
            queue_capacity_bytes: 64 * 1024 * 1024, // 64 MiB on the SD card
            max_records_per_pass: 64,
        }
    }
}

impl NodeConfig {
    /// Full broker URL for the MQTT client (`mqtts://host:port`).
    pub fn broker_url(&self) -> String<96> {
        let mut url = String::new();
        let _ = core::fmt::Write::write_fmt(
            &mut url,
            format_args!("mqtts://{}:{}", self.broker_host, self.broker_port),
        );
        url
    }
}

/// Truncating constructor for compiled-in string defaults.
fn str_field<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
