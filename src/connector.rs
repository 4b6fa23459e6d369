//! Priority-ordered WiFi association.
//!
//! One call is one bounded pass:
//!
//! ```text
//!   scan ──▶ for slot in 0..5 (non-empty, visible) ──▶ associate(timeout)
//!                                   │ fail                    │ ok
//!                                   └── next slot             └──▶ Connected
//!   nothing left ──▶ NoneAvailable
//! ```
//!
//! The connector never loops or sleeps; retrying later is the caller's
//! decision.

use heapless::String;
use log::{info, warn};

use crate::app::ports::{StoragePort, WifiPort};
use crate::credentials::{CredentialStore, NAME_MAX_LEN};

/// Result of one association pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Associated using the profile in `slot`.
    Connected { slot: usize, name: String<NAME_MAX_LEN> },
    /// No stored profile is visible, or every visible one failed.
    NoneAvailable,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkConnector {
    association_timeout_ms: u32,
}

impl NetworkConnector {
    pub const fn new(association_timeout_ms: u32) -> Self {
        Self { association_timeout_ms }
    }

    /// Scan once and try each visible stored profile in slot order.
    pub fn connect<S: StoragePort, W: WifiPort>(
        &self,
        store: &CredentialStore<S>,
        wifi: &mut W,
    ) -> ConnectOutcome {
        let visible = match wifi.scan() {
            Ok(v) => v,
            Err(e) => {
                warn!("Connector: {}", e);
                return ConnectOutcome::NoneAvailable;
            }
        };
        info!("Connector: scan found {} networks", visible.len());

        for (slot, profile) in store.profiles() {
            if !visible.iter().any(|ssid| ssid.as_str() == profile.name.as_str()) {
                continue;
            }
            info!("Connector: trying slot {} ({})", slot, profile.name);
            match wifi.associate(&profile.name, &profile.secret, self.association_timeout_ms) {
                Ok(()) => {
                    info!("Connector: associated with {}", profile.name);
                    return ConnectOutcome::Connected {
                        slot,
                        name: profile.name,
                    };
                }
                Err(e) => warn!("Connector: slot {} failed: {}", slot, e),
            }
        }

        warn!("Connector: no usable network");
        ConnectOutcome::NoneAvailable
    }
}
