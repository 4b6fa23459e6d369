//! WiFi station-mode adapter.
//!
//! Implements [`WifiPort`]: one scan, one bounded association attempt,
//! link status.  Profile selection and retry policy live in
//! [`NetworkConnector`](crate::connector::NetworkConnector), not here.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` over
//!   `EspWifi`.
//! - **all other targets**: a simulated air with a configurable set of
//!   access points, for host-side tests and simulation runs.

use log::{info, warn};

use crate::app::ports::{ScanResult, WifiPort, SSID_MAX_LEN};
use crate::error::ConnectivityError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > SSID_MAX_LEN || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::ConnectFailed);
    }
    Ok(())
}

/// Open networks use an empty secret; WPA2 needs 8–64 bytes.
fn validate_secret(secret: &str) -> Result<(), ConnectivityError> {
    if secret.is_empty() || (8..=64).contains(&secret.len()) {
        Ok(())
    } else {
        Err(ConnectivityError::ConnectFailed)
    }
}

fn push_ssid(out: &mut ScanResult, ssid: &str) {
    if ssid.is_empty() || out.iter().any(|s| s.as_str() == ssid) {
        return;
    }
    let mut s = heapless::String::new();
    if s.push_str(ssid).is_ok() {
        let _ = out.push(s);
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,

    /// Simulation: visible access points and their secrets.
    #[cfg(not(target_os = "espidf"))]
    sim_air: std::vec::Vec<(heapless::String<32>, heapless::String<64>)>,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    /// Bring the radio up in station mode (not yet associated).
    pub fn new(mut wifi: BlockingWifi<EspWifi<'static>>) -> Result<Self, esp_idf_svc::sys::EspError> {
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("WiFi: station started");
        Ok(Self { wifi })
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            sim_air: std::vec::Vec::new(),
            sim_connected: false,
        }
    }

    /// Simulation: make an access point visible.
    pub fn sim_add_network(&mut self, ssid: &str, secret: &str) {
        let mut s = heapless::String::new();
        let mut p = heapless::String::new();
        if s.push_str(ssid).is_ok() && p.push_str(secret).is_ok() {
            self.sim_air.push((s, p));
        }
    }

    /// Simulation: remove every access point; the link drops.
    pub fn sim_clear_air(&mut self) {
        self.sim_air.clear();
        self.sim_connected = false;
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Platform-specific ─────────────────────────────────────────

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    fn platform_scan(&mut self) -> Result<ScanResult, ConnectivityError> {
        let aps = self.wifi.scan().map_err(|e| {
            warn!("WiFi: scan error {}", e);
            ConnectivityError::ScanFailed
        })?;
        let mut out = ScanResult::new();
        for ap in &aps {
            push_ssid(&mut out, ap.ssid.as_str());
        }
        Ok(out)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_scan(&mut self) -> Result<ScanResult, ConnectivityError> {
        let mut out = ScanResult::new();
        for (ssid, _) in &self.sim_air {
            push_ssid(&mut out, ssid);
        }
        Ok(out)
    }

    #[cfg(target_os = "espidf")]
    fn platform_associate(&mut self, ssid: &str, secret: &str, timeout_ms: u32) -> Result<(), ConnectivityError> {
        use esp_idf_svc::hal::delay::FreeRtos;

        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| ConnectivityError::ConnectFailed)?,
            password: secret.try_into().map_err(|_| ConnectivityError::ConnectFailed)?,
            auth_method: if secret.is_empty() { AuthMethod::None } else { AuthMethod::WPA2Personal },
            ..Default::default()
        });
        let _ = self.wifi.disconnect();
        self.wifi
            .set_configuration(&config)
            .map_err(|_| ConnectivityError::ConnectFailed)?;
        self.wifi
            .wifi_mut()
            .connect()
            .map_err(|_| ConnectivityError::ConnectFailed)?;

        const POLL_MS: u32 = 100;
        let mut waited = 0;
        while !self.wifi.is_connected().unwrap_or(false) {
            if waited >= timeout_ms {
                let _ = self.wifi.disconnect();
                return Err(ConnectivityError::AssociationTimeout);
            }
            FreeRtos::delay_ms(POLL_MS);
            waited += POLL_MS;
        }
        self.wifi
            .wait_netif_up()
            .map_err(|_| ConnectivityError::AssociationTimeout)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associate(&mut self, ssid: &str, secret: &str, _timeout_ms: u32) -> Result<(), ConnectivityError> {
        match self.sim_air.iter().find(|(s, _)| s.as_str() == ssid) {
            None => Err(ConnectivityError::AssociationTimeout),
            Some((_, p)) if p.as_str() != secret => Err(ConnectivityError::ConnectFailed),
            Some(_) => {
                self.sim_connected = true;
                Ok(())
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let _ = self.wifi.disconnect();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_connected = false;
    }
}

// ───────────────────────────────────────────────────────────────
// WifiPort
// ───────────────────────────────────────────────────────────────

impl WifiPort for WifiAdapter {
    fn scan(&mut self) -> Result<ScanResult, ConnectivityError> {
        let found = self.platform_scan()?;
        info!("WiFi: {} networks visible", found.len());
        Ok(found)
    }

    fn associate(&mut self, ssid: &str, secret: &str, timeout_ms: u32) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_secret(secret)?;
        info!("WiFi: associating with '{}' ({} ms timeout)", ssid, timeout_ms);
        match self.platform_associate(ssid, secret, timeout_ms) {
            Ok(()) => {
                info!("WiFi: link up ('{}')", ssid);
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: '{}' failed: {}", ssid, e);
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnected");
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
