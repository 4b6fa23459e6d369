//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (sensors, radio, broker, storage, LEDs, event sinks)
//! implement these traits.  The domain components consume them via
//! generics, so none of them touches hardware directly and every state
//! machine can be exercised on the host with mocks.
//!
//! ## Durability notes
//!
//! - **LogDevice::append** MUST NOT return `Ok` before the bytes are on the
//!   persistent medium.
//! - **StoragePort::write** MUST be atomic per key; the credential store
//!   relies on this for slot isolation.

use heapless::{String, Vec};

use crate::config::NodeConfig;
use crate::error::{BrokerError, ConnectivityError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One reading from each force channel, uninterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelReadings {
    pub load_cell: i32,
    pub strain_gauge: i32,
}

/// Read-side port: the sampler calls this once per sampling cycle.
pub trait SensorPort {
    /// Read both channels.  Blocks for at most the converters' bounded
    /// data-ready wait.
    fn read_channels(&mut self) -> Result<ChannelReadings, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Status indicators (driven adapter: domain → LEDs)
// ───────────────────────────────────────────────────────────────

/// Two informational outputs.  No input, no effect on control flow.
pub trait IndicatorPort {
    /// Network-link indicator.
    fn set_link(&mut self, on: bool);
    /// Broker-session indicator.
    fn set_session(&mut self, on: bool);
    /// Storage alarm: drive both outputs to `phase_on`.  The caller
    /// toggles the phase to blink.
    fn show_alarm(&mut self, phase_on: bool) {
        let _ = phase_on;
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// WiFi port (driven adapter: domain ↔ radio)
// ───────────────────────────────────────────────────────────────

/// Longest SSID the radio reports.
pub const SSID_MAX_LEN: usize = 32;
/// Visible networks kept from one scan.
pub const MAX_SCAN_RESULTS: usize = 16;

/// Network identifiers seen by one scan, strongest first.
pub type ScanResult = Vec<String<SSID_MAX_LEN>, MAX_SCAN_RESULTS>;

/// Station-mode radio.  Every call is bounded; nothing here loops or
/// retries on its own.
pub trait WifiPort {
    /// Scan for visible network identifiers.
    fn scan(&mut self) -> Result<ScanResult, ConnectivityError>;

    /// Associate with `ssid`, giving up after `timeout_ms`.
    fn associate(&mut self, ssid: &str, secret: &str, timeout_ms: u32)
        -> Result<(), ConnectivityError>;

    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Drop the current association, if any.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain ↔ MQTT client)
// ───────────────────────────────────────────────────────────────

/// Longest inbound topic kept.
pub const INBOUND_TOPIC_LEN: usize = 64;
/// Longest inbound payload kept; longer payloads are truncated.
pub const INBOUND_PAYLOAD_LEN: usize = 64;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<INBOUND_TOPIC_LEN>,
    pub payload: Vec<u8, INBOUND_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// Build a message, truncating topic and payload to their bounds.
    pub fn new(topic: &str, payload: &[u8]) -> Self {
        let mut t = String::new();
        for c in topic.chars() {
            if t.push(c).is_err() {
                break;
            }
        }
        let n = payload.len().min(INBOUND_PAYLOAD_LEN);
        let mut p = Vec::new();
        let _ = p.extend_from_slice(&payload[..n]);
        Self { topic: t, payload: p }
    }
}

/// Connection parameters handed to [`BrokerPort::connect`].
#[derive(Debug, Clone, Copy)]
pub struct BrokerOptions<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl<'a> BrokerOptions<'a> {
    pub fn from_config(config: &'a NodeConfig, client_id: &'a str) -> Self {
        Self {
            client_id,
            username: config.broker_username.as_str(),
            password: config.broker_password.as_str(),
        }
    }
}

/// Pub/sub broker client.
///
/// Inbound messages are buffered by the adapter and only handed to the
/// domain through [`poll_inbound`](BrokerPort::poll_inbound), which the
/// session manager calls from its own tick.
pub trait BrokerPort {
    /// Open a session.  Bounded by the client's network timeout.
    fn connect(&mut self, options: &BrokerOptions<'_>) -> Result<(), BrokerError>;

    /// Subscribe to `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Publish one payload and wait for the broker acknowledgment.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Broker liveness.
    fn is_connected(&self) -> bool;

    /// Next buffered inbound message, oldest first.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Tear down the session.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Log device port (driven adapter: queue ↔ SD card / RAM)
// ───────────────────────────────────────────────────────────────

/// Append-only byte log backing the durable sample queue.
pub trait LogDevice {
    /// Current log length in bytes.
    fn len(&mut self) -> Result<u64, StorageError>;

    /// Append `data`.  Returns only after the bytes are durable.
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Read up to `buf.len()` bytes starting at `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Cut the log back to `len` bytes (torn-tail recovery).
    fn truncate(&mut self, len: u64) -> Result<(), StorageError>;

    /// Drop the first `upto` bytes.  Must be crash-safe: after a power cut
    /// the log holds either the old content or the new suffix.
    fn discard_prefix(&mut self, upto: u64) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate config values before persisting and
/// reject invalid ranges with [`ConfigError::ValidationFailed`].
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for credentials and config.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic: no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] and [`LogDevice`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key or file does not exist.
    NotFound,
    /// Storage partition or medium is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
