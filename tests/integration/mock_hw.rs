//! Mock hardware for integration tests.
//!
//! Each mock records what the node did to it so tests can assert on the
//! full interaction history without a radio, broker or sensors.

use std::collections::VecDeque;

use crackwatch::adapters::mem_log::MemLogDevice;
use crackwatch::adapters::nvs::NvsAdapter;
use crackwatch::app::events::AppEvent;
use crackwatch::app::ports::{
    BrokerOptions, BrokerPort, ChannelReadings, EventSink, IndicatorPort, InboundMessage,
    ScanResult, SensorPort, WifiPort,
};
use crackwatch::app::service::NodeService;
use crackwatch::config::NodeConfig;
use crackwatch::credentials::CredentialStore;
use crackwatch::error::{BrokerError, ConnectivityError, SensorError};
use crackwatch::queue::DurableQueue;

// ── MockWifi ──────────────────────────────────────────────────

/// Radio with a scripted set of visible networks.
#[derive(Default)]
pub struct MockWifi {
    /// Networks returned by `scan`, in order.
    pub visible: Vec<&'static str>,
    /// Networks that accept association (any secret).
    pub accepting: Vec<&'static str>,
    /// Every association attempt, in order.
    pub attempts: Vec<String>,
    pub connected: Option<String>,
}

#[allow(dead_code)]
impl MockWifi {
    pub fn new(visible: &[&'static str], accepting: &[&'static str]) -> Self {
        Self {
            visible: visible.to_vec(),
            accepting: accepting.to_vec(),
            ..Self::default()
        }
    }

    pub fn drop_link(&mut self) {
        self.connected = None;
    }
}

impl WifiPort for MockWifi {
    fn scan(&mut self) -> Result<ScanResult, ConnectivityError> {
        let mut out = ScanResult::new();
        for ssid in &self.visible {
            let mut s = heapless::String::new();
            s.push_str(ssid).unwrap();
            out.push(s).unwrap();
        }
        Ok(out)
    }

    fn associate(&mut self, ssid: &str, _secret: &str, _timeout_ms: u32) -> Result<(), ConnectivityError> {
        self.attempts.push(ssid.to_owned());
        if self.accepting.iter().any(|a| *a == ssid) {
            self.connected = Some(ssid.to_owned());
            Ok(())
        } else {
            Err(ConnectivityError::AssociationTimeout)
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    fn disconnect(&mut self) {
        self.connected = None;
    }
}

// ── MockBroker ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub reachable: bool,
    pub connected: bool,
    /// Publishes accepted before every further publish fails.
    pub publish_budget: Option<usize>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub connects: usize,
    pub inbox: VecDeque<InboundMessage>,
}

#[allow(dead_code)]
impl MockBroker {
    pub fn new() -> Self {
        Self {
            reachable: true,
            ..Self::default()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbox.push_back(InboundMessage::new(topic, payload));
    }

    pub fn payloads(&self) -> Vec<&str> {
        self.published.iter().map(|(_, p)| p.as_str()).collect()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, _options: &BrokerOptions<'_>) -> Result<(), BrokerError> {
        self.connects += 1;
        if !self.reachable {
            return Err(BrokerError::HandshakeFailed);
        }
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        if let Some(budget) = self.publish_budget.as_mut() {
            if *budget == 0 {
                return Err(BrokerError::TransmitFailed);
            }
            *budget -= 1;
        }
        self.published
            .push((topic.to_owned(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

// ── MockSensors ───────────────────────────────────────────────

/// Returns (n, -n) on the n-th read, starting at 1.
#[derive(Default)]
pub struct MockSensors {
    pub reads: i32,
}

impl SensorPort for MockSensors {
    fn read_channels(&mut self) -> Result<ChannelReadings, SensorError> {
        self.reads += 1;
        Ok(ChannelReadings {
            load_cell: self.reads,
            strain_gauge: -self.reads,
        })
    }
}

// ── MockIndicators ────────────────────────────────────────────

#[derive(Default)]
pub struct MockIndicators {
    pub link: bool,
    pub session: bool,
}

impl IndicatorPort for MockIndicators {
    fn set_link(&mut self, on: bool) {
        self.link = on;
    }

    fn set_session(&mut self, on: bool) {
        self.session = on;
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Collects every emitted event.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A node plus every mock it talks to.
pub struct Rig {
    pub node: NodeService<NvsAdapter, MemLogDevice>,
    pub wifi: MockWifi,
    pub sensors: MockSensors,
    pub broker: MockBroker,
    pub leds: MockIndicators,
    pub sink: LogSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(wifi: MockWifi) -> Self {
        Self::with_config(NodeConfig::default(), wifi)
    }

    pub fn with_config(config: NodeConfig, wifi: MockWifi) -> Self {
        let creds = CredentialStore::new(NvsAdapter::new().unwrap());
        let queue = DurableQueue::open(MemLogDevice::new(), config.queue_capacity_bytes).unwrap();
        Self {
            node: NodeService::new(config, creds, queue, "crackwatch-efcafe"),
            wifi,
            sensors: MockSensors::default(),
            broker: MockBroker::new(),
            leds: MockIndicators::default(),
            sink: LogSink::default(),
        }
    }

    pub fn tick(&mut self, now_ms: u64) {
        self.node
            .tick(
                now_ms,
                &mut self.wifi,
                &mut self.sensors,
                &mut self.broker,
                &mut self.leds,
                &mut self.sink,
            )
            .unwrap();
    }

    /// Tick every `step` ms over `[from, to)`.
    pub fn run(&mut self, from: u64, to: u64, step: usize) {
        for t in (from..to).step_by(step) {
            self.tick(t);
        }
    }
}
