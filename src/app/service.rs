//! Application service: the hexagonal core.
//!
//! [`NodeService`] owns every stateful component (credential store,
//! sample queue, sampler, broker session) and runs them in a fixed order
//! once per loop iteration.  All I/O flows through port traits passed in
//! at the call site, so the whole node runs on the host against mocks.
//!
//! ```text
//!   WifiPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//! SensorPort ──▶ │          NodeService         │ ──▶ IndicatorPort
//! BrokerPort ◀─▶ │ link · sampler · session     │
//!                └──────────────┬───────────────┘
//!                               ▼
//!                     DurableQueue<LogDevice>
//! ```

use log::{error, info, warn};

use crate::config::NodeConfig;
use crate::connector::{ConnectOutcome, NetworkConnector};
use crate::credentials::{CredentialProfile, CredentialStore};
use crate::error::Error;
use crate::queue::DurableQueue;
use crate::sampler::{SampleProducer, SamplerState};
use crate::scheduler::Cadence;
use crate::session::{SessionManager, SessionState};

use super::commands::ConsoleCommand;
use super::events::AppEvent;
use super::ports::{
    BrokerPort, EventSink, IndicatorPort, LogDevice, SensorPort, StoragePort, WifiPort,
};

/// Half-period of the storage-alarm blink.
const ALARM_BLINK_MS: u64 = 500;

pub struct NodeService<S: StoragePort, D: LogDevice> {
    config: NodeConfig,
    credentials: CredentialStore<S>,
    connector: NetworkConnector,
    queue: DurableQueue<D>,
    sampler: SampleProducer,
    session: SessionManager,
    wifi_retry: Cadence,
    link_up: bool,
    /// Set once per outage so the alarm is not repeated every retry.
    provisioning_required: bool,
}

impl<S: StoragePort, D: LogDevice> NodeService<S, D> {
    /// Assemble the service around an already recovered queue.
    pub fn new(
        config: NodeConfig,
        credentials: CredentialStore<S>,
        queue: DurableQueue<D>,
        client_id: &str,
    ) -> Self {
        Self {
            connector: NetworkConnector::new(config.association_timeout_ms),
            sampler: SampleProducer::new(&config),
            session: SessionManager::new(&config, client_id),
            wifi_retry: Cadence::new(config.wifi_retry_interval_ms),
            config,
            credentials,
            queue,
            link_up: false,
            provisioning_required: false,
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let pending = self.queue.len();
        info!("Node: started, {} samples pending", pending);
        sink.emit(&AppEvent::Started { pending });
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One cooperative step: link → sampler → session → indicators.
    ///
    /// Only invariant breaches are returned; the caller restarts the node
    /// on `Err`.
    pub fn tick<W, R, B, I, E>(
        &mut self,
        now_ms: u64,
        wifi: &mut W,
        sensors: &mut R,
        broker: &mut B,
        indicators: &mut I,
        sink: &mut E,
    ) -> Result<(), Error>
    where
        W: WifiPort,
        R: SensorPort,
        B: BrokerPort,
        I: IndicatorPort,
        E: EventSink,
    {
        // 1. Connectivity
        self.maintain_link(now_ms, wifi, sink);

        // 2. Capture (never gated on the network)
        self.sampler.tick(now_ms, sensors, &mut self.queue, sink);

        // 3. Broker session and draining
        if let Err(e) = self.session.tick(now_ms, self.link_up, &mut self.queue, broker, sink) {
            if e.is_fatal() {
                error!("Node: {}", e);
                return Err(e);
            }
            warn!("Node: session step failed: {}", e);
        }

        // 4. Indicators
        if self.sampler.is_halted() {
            indicators.show_alarm((now_ms / ALARM_BLINK_MS) % 2 == 0);
        } else {
            indicators.set_link(self.link_up);
            indicators.set_session(self.session.state().has_session());
        }
        Ok(())
    }

    fn maintain_link<W: WifiPort, E: EventSink>(&mut self, now_ms: u64, wifi: &mut W, sink: &mut E) {
        if self.link_up && !wifi.is_connected() {
            warn!("Node: WiFi link lost");
            self.link_up = false;
            self.wifi_retry.reset();
            sink.emit(&AppEvent::NetworkDown);
        }
        if self.link_up || !self.wifi_retry.poll(now_ms) {
            return;
        }
        match self.connector.connect(&self.credentials, wifi) {
            ConnectOutcome::Connected { slot, name } => {
                self.link_up = true;
                self.provisioning_required = false;
                sink.emit(&AppEvent::NetworkUp { slot, name });
            }
            ConnectOutcome::NoneAvailable => {
                if !self.provisioning_required {
                    warn!("Node: no stored network reachable");
                    self.provisioning_required = true;
                    sink.emit(&AppEvent::ProvisioningRequired);
                }
            }
        }
    }

    // ── Provisioning ──────────────────────────────────────────

    /// Store a new network profile and retry association on the next tick.
    pub fn provision(&mut self, profile: &CredentialProfile) -> Result<usize, Error> {
        let slot = self.credentials.provision(profile)?;
        info!("Node: '{}' provisioned into slot {}", profile.name, slot);
        if !self.link_up {
            self.wifi_retry.reset();
        }
        Ok(slot)
    }

    /// Forget every stored network.
    pub fn forget_networks(&mut self) -> Result<(), Error> {
        self.credentials.erase_all()?;
        info!("Node: all network profiles erased");
        Ok(())
    }

    /// Store a build-time network when nothing has been provisioned yet.
    pub fn seed_network(&mut self, profile: &CredentialProfile) -> Result<bool, Error> {
        let seeded = self.credentials.seed(profile)?;
        if seeded {
            info!("Node: seeded '{}' into slot 0", profile.name);
        }
        Ok(seeded)
    }

    /// Apply a command typed on the serial console.
    pub fn apply_console(&mut self, cmd: &ConsoleCommand) -> Result<(), Error> {
        match cmd {
            ConsoleCommand::Provision(profile) => self.provision(profile).map(|_| ()),
            ConsoleCommand::ForgetNetworks => self.forget_networks(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn provisioning_required(&self) -> bool {
        self.provisioning_required
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn sampler_state(&self) -> SamplerState {
        self.sampler.state()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queue(&self) -> &DurableQueue<D> {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut DurableQueue<D> {
        &mut self.queue
    }

    pub fn credentials(&self) -> &CredentialStore<S> {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mem_log::MemLogDevice;
    use crate::adapters::mqtt::MqttAdapter;
    use crate::adapters::nvs::NvsAdapter;
    use crate::adapters::wifi::WifiAdapter;
    use crate::app::ports::ChannelReadings;
    use crate::error::SensorError;

    struct Flat;
    impl SensorPort for Flat {
        fn read_channels(&mut self) -> Result<ChannelReadings, SensorError> {
            Ok(ChannelReadings {
                load_cell: 7,
                strain_gauge: -3,
            })
        }
    }

    #[derive(Default)]
    struct Leds {
        link: bool,
        session: bool,
        alarm: Option<bool>,
    }
    impl IndicatorPort for Leds {
        fn set_link(&mut self, on: bool) {
            self.link = on;
            self.alarm = None;
        }
        fn set_session(&mut self, on: bool) {
            self.session = on;
        }
        fn show_alarm(&mut self, phase_on: bool) {
            self.alarm = Some(phase_on);
        }
    }

    #[derive(Default)]
    struct Events(std::vec::Vec<AppEvent>);
    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn service() -> NodeService<NvsAdapter, MemLogDevice> {
        let cfg = NodeConfig::default();
        let creds = CredentialStore::new(NvsAdapter::new().unwrap());
        let queue = DurableQueue::open(MemLogDevice::new(), cfg.queue_capacity_bytes).unwrap();
        NodeService::new(cfg, creds, queue, "crackwatch-efcafe")
    }

    #[test]
    fn start_reports_pending_samples() {
        let mut svc = service();
        svc.queue_mut().append(0, ChannelReadings::default()).unwrap();
        let mut ev = Events::default();
        svc.start(&mut ev);
        assert_eq!(ev.0, [AppEvent::Started { pending: 1 }]);
    }

    #[test]
    fn samples_while_unprovisioned() {
        let mut svc = service();
        let (mut wifi, mut broker) = (WifiAdapter::new(), MqttAdapter::new("mqtts://sim:8883"));
        let (mut leds, mut ev) = (Leds::default(), Events::default());
        for t in (0..3000).step_by(500) {
            svc.tick(t, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        }
        assert_eq!(svc.pending(), 3);
        assert!(svc.provisioning_required());
        let alarms = ev.0.iter().filter(|e| **e == AppEvent::ProvisioningRequired).count();
        assert_eq!(alarms, 1);
        assert!(!leds.link && !leds.session);
    }

    #[test]
    fn provisioning_brings_the_link_up_next_tick() {
        let mut svc = service();
        let (mut wifi, mut broker) = (WifiAdapter::new(), MqttAdapter::new("mqtts://sim:8883"));
        let (mut leds, mut ev) = (Leds::default(), Events::default());
        wifi.sim_add_network("site-office", "password1");
        svc.tick(0, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert!(!svc.link_up());

        let p = CredentialProfile::new("site-office", "password1").unwrap();
        assert_eq!(svc.provision(&p).unwrap(), 0);
        svc.tick(100, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert!(svc.link_up());
        assert_eq!(svc.session_state(), SessionState::Locked);
        assert!(leds.link && leds.session);
    }

    #[test]
    fn seeded_network_connects_on_first_tick() {
        let mut svc = service();
        let (mut wifi, mut broker) = (WifiAdapter::new(), MqttAdapter::new("mqtts://sim:8883"));
        let (mut leds, mut ev) = (Leds::default(), Events::default());
        wifi.sim_add_network("factory-ap", "password1");
        let p = CredentialProfile::new("factory-ap", "password1").unwrap();
        assert!(svc.seed_network(&p).unwrap());
        svc.tick(0, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert!(svc.link_up());
        assert!(ev.0.iter().any(|e| matches!(e, AppEvent::NetworkUp { slot: 0, .. })));
    }

    #[test]
    fn console_forget_clears_every_slot() {
        let mut svc = service();
        svc.apply_console(&ConsoleCommand::Provision(
            CredentialProfile::new("site-office", "password1").unwrap(),
        ))
        .unwrap();
        assert_eq!(svc.credentials().profiles().count(), 1);
        svc.apply_console(&ConsoleCommand::ForgetNetworks).unwrap();
        assert_eq!(svc.credentials().profiles().count(), 0);
    }

    #[test]
    fn link_loss_is_reported_and_session_dropped() {
        let mut svc = service();
        let (mut wifi, mut broker) = (WifiAdapter::new(), MqttAdapter::new("mqtts://sim:8883"));
        let (mut leds, mut ev) = (Leds::default(), Events::default());
        wifi.sim_add_network("site-office", "password1");
        svc.provision(&CredentialProfile::new("site-office", "password1").unwrap())
            .unwrap();
        svc.tick(0, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert!(svc.link_up());

        wifi.sim_clear_air();
        svc.tick(100, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert!(!svc.link_up());
        assert!(ev.0.contains(&AppEvent::NetworkDown));
        assert_eq!(svc.session_state(), SessionState::Disconnected);
    }

    #[test]
    fn halted_sampler_blinks_indicators() {
        let mut svc = service();
        let (mut wifi, mut broker) = (WifiAdapter::new(), MqttAdapter::new("mqtts://sim:8883"));
        let (mut leds, mut ev) = (Leds::default(), Events::default());
        svc.queue_mut().device_mut().set_failing(true);
        svc.tick(0, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert!(matches!(svc.sampler_state(), SamplerState::Halted(_)));
        assert_eq!(leds.alarm, Some(true));
        svc.tick(600, &mut wifi, &mut Flat, &mut broker, &mut leds, &mut ev).unwrap();
        assert_eq!(leds.alarm, Some(false));
    }
}
