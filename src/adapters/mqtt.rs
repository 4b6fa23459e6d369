//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] over the ESP-IDF MQTT client (TLS transport,
//! `mqtts://`).  The ESP-IDF client delivers events on its own task; the
//! callback only updates a small `Shared` block behind a mutex:
//!
//! ```text
//!  esp-mqtt task ──callback──▶ Shared { connected, acked ids, inbox } ◀── main loop
//!                                                        poll_inbound() ─┘
//! ```
//!
//! Nothing in the callback touches the queue or the session state.
//!
//! On the host the same `Shared` block is driven by a simulated broker.

use std::sync::{Arc, Mutex, MutexGuard};

use heapless::Deque;
use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{BrokerOptions, BrokerPort, InboundMessage};
use crate::error::BrokerError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

/// Inbound messages buffered between two session ticks.
pub const INBOX_DEPTH: usize = 8;
/// Publish acknowledgments remembered while waiting.
const ACK_DEPTH: usize = 8;
/// Upper bound on waiting for CONNACK / PUBACK.
pub const BROKER_TIMEOUT_MS: u32 = 10_000;

// ───────────────────────────────────────────────────────────────
// Shared state (callback ↔ main loop)
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct Shared {
    connected: bool,
    /// Set once the client gave up or was torn down.
    failed: bool,
    acked: Deque<u32, ACK_DEPTH>,
    inbox: Deque<InboundMessage, INBOX_DEPTH>,
    dropped: u32,
}

impl Shared {
    fn push_inbound(&mut self, msg: InboundMessage) {
        if self.inbox.is_full() {
            let _ = self.inbox.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
        }
        let _ = self.inbox.push_back(msg);
    }

    fn push_ack(&mut self, id: u32) {
        if self.acked.is_full() {
            let _ = self.acked.pop_front();
        }
        let _ = self.acked.push_back(id);
    }

    fn take_ack(&mut self, id: u32) -> bool {
        let n = self.acked.len();
        let mut found = false;
        for _ in 0..n {
            if let Some(a) = self.acked.pop_front() {
                if a == id && !found {
                    found = true;
                } else {
                    let _ = self.acked.push_back(a);
                }
            }
        }
        found
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panic in the callback cannot leave `Shared` half-updated in a way
    // that matters; keep going with whatever it holds.
    shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    url: heapless::String<96>,
    shared: Arc<Mutex<Shared>>,

    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,

    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

impl MqttAdapter {
    pub fn new(url: &str) -> Self {
        let mut u = heapless::String::new();
        for c in url.chars() {
            if u.push(c).is_err() {
                break;
            }
        }
        Self {
            url: u,
            shared: Arc::new(Mutex::new(Shared::default())),
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
        }
    }

    /// Inbound messages discarded because the inbox was full.
    pub fn dropped_inbound(&self) -> u32 {
        lock(&self.shared).dropped
    }
}

// ── Platform-specific ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    fn platform_connect(&mut self, options: &BrokerOptions<'_>) -> Result<(), BrokerError> {
        use esp_idf_svc::hal::delay::FreeRtos;

        self.client = None;
        *lock(&self.shared) = Shared::default();

        let conf = MqttClientConfiguration {
            client_id: Some(options.client_id),
            username: Some(options.username),
            password: Some(options.password),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            network_timeout: core::time::Duration::from_millis(u64::from(BROKER_TIMEOUT_MS)),
            ..Default::default()
        };

        let shared = Arc::clone(&self.shared);
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| {
            let mut s = lock(&shared);
            match event.payload() {
                EventPayload::Connected(_) => s.connected = true,
                EventPayload::Disconnected => s.connected = false,
                EventPayload::Published(id) => s.push_ack(id),
                EventPayload::Received { topic, data, .. } => {
                    s.push_inbound(InboundMessage::new(topic.unwrap_or(""), data));
                }
                EventPayload::Error(e) => {
                    warn!("MQTT: client error {:?}", e);
                }
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            BrokerError::HandshakeFailed
        })?;
        self.client = Some(client);

        const POLL_MS: u32 = 50;
        let mut waited = 0;
        while !lock(&self.shared).connected {
            if waited >= BROKER_TIMEOUT_MS {
                self.client = None;
                return Err(BrokerError::HandshakeFailed);
            }
            FreeRtos::delay_ms(POLL_MS);
            waited += POLL_MS;
        }
        Ok(())
    }

    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|_| BrokerError::SubscribeFailed)
    }

    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        use esp_idf_svc::hal::delay::FreeRtos;

        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        let id = client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|_| BrokerError::TransmitFailed)?;

        const POLL_MS: u32 = 10;
        let mut waited = 0;
        loop {
            {
                let mut s = lock(&self.shared);
                if s.take_ack(id) {
                    return Ok(());
                }
                if !s.connected {
                    return Err(BrokerError::TransmitFailed);
                }
            }
            if waited >= BROKER_TIMEOUT_MS {
                return Err(BrokerError::TransmitFailed);
            }
            FreeRtos::delay_ms(POLL_MS);
            waited += POLL_MS;
        }
    }

    fn platform_disconnect(&mut self) {
        // Dropping the client stops its task and closes the socket.
        self.client = None;
        lock(&self.shared).connected = false;
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// Host stand-in for the broker at the other end of the socket.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub unreachable: bool,
    pub reject_publish: bool,
    pub subscriptions: std::vec::Vec<std::string::String>,
    pub published: std::vec::Vec<(std::string::String, std::vec::Vec<u8>)>,
    next_id: u32,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn sim(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    /// Deliver `payload` on `topic` as if the broker pushed it.
    pub fn sim_deliver(&mut self, topic: &str, payload: &[u8]) {
        let subscribed = self.sim.subscriptions.iter().any(|t| t == topic);
        let mut s = lock(&self.shared);
        if s.connected && subscribed {
            s.push_inbound(InboundMessage::new(topic, payload));
        }
    }

    /// Drop the session from the broker side.
    pub fn sim_drop_session(&mut self) {
        let mut s = lock(&self.shared);
        s.connected = false;
        s.failed = true;
    }

    fn platform_connect(&mut self, options: &BrokerOptions<'_>) -> Result<(), BrokerError> {
        *lock(&self.shared) = Shared::default();
        if self.sim.unreachable {
            return Err(BrokerError::HandshakeFailed);
        }
        info!("MQTT(sim): {} connected as {}", self.url, options.client_id);
        lock(&self.shared).connected = true;
        Ok(())
    }

    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !lock(&self.shared).connected {
            return Err(BrokerError::NotConnected);
        }
        self.sim.subscriptions.push(topic.to_owned());
        Ok(())
    }

    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !lock(&self.shared).connected {
            return Err(BrokerError::NotConnected);
        }
        if self.sim.reject_publish {
            return Err(BrokerError::TransmitFailed);
        }
        self.sim.next_id = self.sim.next_id.wrapping_add(1);
        let id = self.sim.next_id;
        self.sim.published.push((topic.to_owned(), payload.to_vec()));
        let mut s = lock(&self.shared);
        s.push_ack(id);
        if s.take_ack(id) {
            Ok(())
        } else {
            Err(BrokerError::TransmitFailed)
        }
    }

    fn platform_disconnect(&mut self) {
        self.sim.subscriptions.clear();
        lock(&self.shared).connected = false;
    }
}

// ───────────────────────────────────────────────────────────────
// BrokerPort
// ───────────────────────────────────────────────────────────────

impl BrokerPort for MqttAdapter {
    fn connect(&mut self, options: &BrokerOptions<'_>) -> Result<(), BrokerError> {
        info!("MQTT: connecting to {}", self.url);
        self.platform_connect(options)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.platform_subscribe(topic)?;
        info!("MQTT: subscribed to {}", topic);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.platform_publish(topic, payload)
    }

    fn is_connected(&self) -> bool {
        let s = lock(&self.shared);
        s.connected && !s.failed
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        lock(&self.shared).inbox.pop_front()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
    }
}
