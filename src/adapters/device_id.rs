//! Device identity derived from the ESP32 factory MAC address.
//!
//! The broker client identifier is `crackwatch-xxyyzz`, built from the
//! last three MAC bytes.  It is stable across reboots (eFuse MAC), so a
//! reconnecting node takes over its own previous session.

use core::fmt::Write;

use crate::session::CLIENT_ID_LEN;

pub type ClientId = heapless::String<CLIENT_ID_LEN>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: a fixed fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// `crackwatch-xxyyzz` (lowercase hex of MAC bytes 3..6).
pub fn client_id(mac: &MacAddress) -> ClientId {
    let mut id = ClientId::new();
    let _ = write!(id, "crackwatch-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}
