//! Broker session state machine.
//!
//! ```text
//!                 link up, no session
//!  DISCONNECTED ───────────────────────▶ CONNECTING ◀──┐ connect/subscribe
//!       ▲                                    │         │ failed, retry after
//!       │                        connected + │         │ reconnect delay
//!       │                         subscribed ▼         │
//!       │                                 LOCKED ──────┘
//!       │                                    │
//!       │                  exact START on    │
//!       │                  command topic     ▼
//!       └──── link lost / broker dead ── AUTHORIZED ──▶ drain pass every
//!             (from any state)                          send interval; a
//!                                                       capped pass goes
//!                                                       on next tick
//! ```
//!
//! The authorization flag outlives the session under
//! [`AuthorizationScope::Boot`]: after a reconnect the machine goes
//! Connecting → Locked → Authorized in one tick and drains immediately.
//! Under [`AuthorizationScope::Connection`] every drop to Disconnected
//! clears it.
//!
//! Inbound messages are only read inside [`SessionManager::tick`]; a
//! command buffered by the broker adapter during cycle N takes effect in
//! cycle N's session step.

mod drain;

use heapless::String;
use log::{info, warn};

use crate::app::commands::RemoteCommand;
use crate::app::events::AppEvent;
use crate::app::ports::{BrokerOptions, BrokerPort, EventSink, LogDevice};
use crate::config::{AuthorizationScope, NodeConfig};
use crate::error::Error;
use crate::queue::DurableQueue;
use crate::scheduler::Cadence;

pub use drain::DrainReport;

/// Broker session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Locked,
    Authorized,
}

impl SessionState {
    /// Whether a broker session is established.
    pub fn has_session(self) -> bool {
        matches!(self, Self::Locked | Self::Authorized)
    }
}

/// Longest MQTT client id (`crackwatch-xxyyzz` fits comfortably).
pub const CLIENT_ID_LEN: usize = 32;

pub struct SessionManager {
    state: SessionState,
    authorized: bool,
    config: NodeConfig,
    client_id: String<CLIENT_ID_LEN>,
    reconnect: Cadence,
    send: Cadence,
    /// The last pass hit the per-pass cap with records still unsent.
    pass_capped: bool,
}

impl SessionManager {
    pub fn new(config: &NodeConfig, client_id: &str) -> Self {
        let mut id = String::new();
        for c in client_id.chars() {
            if id.push(c).is_err() {
                break;
            }
        }
        Self {
            state: SessionState::Disconnected,
            authorized: false,
            config: config.clone(),
            client_id: id,
            reconnect: Cadence::new(config.reconnect_delay_ms),
            send: Cadence::new(config.send_interval_ms),
            pass_capped: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Advance the session by one cooperative step.
    ///
    /// Only invariant breaches escape as `Err` (see [`Error::is_fatal`]);
    /// broker and transmit failures are handled here and retried on their
    /// own cadence.
    pub fn tick<D, B, E>(
        &mut self,
        now_ms: u64,
        link_up: bool,
        queue: &mut DurableQueue<D>,
        broker: &mut B,
        sink: &mut E,
    ) -> Result<(), Error>
    where
        D: LogDevice,
        B: BrokerPort,
        E: EventSink,
    {
        // ── Liveness ───────────────────────────────────────────
        if self.state != SessionState::Disconnected {
            let lost_broker = self.state.has_session() && !broker.is_connected();
            if !link_up || lost_broker {
                warn!(
                    "Session: {} lost",
                    if link_up { "broker session" } else { "network link" }
                );
                broker.disconnect();
                self.transition(SessionState::Disconnected, sink);
            }
        }
        if !link_up {
            return Ok(());
        }

        // ── Establish ──────────────────────────────────────────
        if self.state == SessionState::Disconnected {
            self.transition(SessionState::Connecting, sink);
        }
        if self.state == SessionState::Connecting && self.reconnect.poll(now_ms) {
            self.try_establish(broker, sink);
        }
        if !self.state.has_session() {
            return Ok(());
        }

        // ── Commands ───────────────────────────────────────────
        while let Some(msg) = broker.poll_inbound() {
            match RemoteCommand::parse(&msg, &self.config.command_topic, &self.config.start_token) {
                Some(RemoteCommand::Start) => {
                    if !self.authorized {
                        info!("Session: START received, transmission authorized");
                    }
                    self.authorized = true;
                }
                None => {
                    info!(
                        "Session: ignoring message on {} ({} bytes)",
                        msg.topic,
                        msg.payload.len()
                    );
                    sink.emit(&AppEvent::CommandIgnored);
                }
            }
        }

        // ── Drain ──────────────────────────────────────────────
        if self.state == SessionState::Locked && self.authorized {
            self.transition(SessionState::Authorized, sink);
            self.send.mark(now_ms);
            return self.drain(queue, broker, sink);
        }
        if self.state == SessionState::Authorized
            && !queue.is_empty()
            && (self.pass_capped || self.send.poll(now_ms))
        {
            return self.drain(queue, broker, sink);
        }
        Ok(())
    }

    fn try_establish<B: BrokerPort, E: EventSink>(&mut self, broker: &mut B, sink: &mut E) {
        let options = BrokerOptions::from_config(&self.config, &self.client_id);
        let result = broker
            .connect(&options)
            .and_then(|()| broker.subscribe(&self.config.command_topic));
        match result {
            Ok(()) => {
                info!(
                    "Session: connected to {} as {}, subscribed to {}",
                    self.config.broker_url(),
                    self.client_id,
                    self.config.command_topic
                );
                self.transition(SessionState::Locked, sink);
            }
            Err(e) => {
                warn!(
                    "Session: {}, retrying in {} ms",
                    e,
                    self.reconnect.interval_ms()
                );
                broker.disconnect();
                sink.emit(&AppEvent::BrokerRetry(e));
            }
        }
    }

    fn drain<D, B, E>(
        &mut self,
        queue: &mut DurableQueue<D>,
        broker: &mut B,
        sink: &mut E,
    ) -> Result<(), Error>
    where
        D: LogDevice,
        B: BrokerPort,
        E: EventSink,
    {
        let cap = usize::from(self.config.max_records_per_pass);
        self.pass_capped = false;
        let report = drain::run_pass(queue, broker, &self.config.telemetry_topic, cap)?;
        self.pass_capped = report.sent == cap && report.remaining > 0;
        if let Some(seq) = report.failed_seq {
            sink.emit(&AppEvent::TransmitFailed { seq });
        }
        sink.emit(&AppEvent::DrainCompleted {
            sent: report.sent,
            remaining: report.remaining,
        });
        Ok(())
    }

    fn transition<E: EventSink>(&mut self, to: SessionState, sink: &mut E) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        if to == SessionState::Disconnected {
            self.pass_capped = false;
        }
        if to == SessionState::Disconnected
            && self.config.authorization_scope == AuthorizationScope::Connection
            && self.authorized
        {
            info!("Session: authorization cleared with the connection");
            self.authorized = false;
        }
        info!("Session: {:?} -> {:?}", from, to);
        sink.emit(&AppEvent::SessionChanged { from, to });
    }
}
