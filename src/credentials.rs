//! Multi-profile WiFi credential store.
//!
//! Five fixed slots, highest priority first.  Each slot is its own NVS key
//! (`wifi/slot0` … `wifi/slot4`) holding a zero-padded postcard blob, so a
//! power cut during a write can only affect that one slot.
//!
//! ```text
//!   slot 0  "workshop"      ← tried first
//!   slot 1  ""              (empty)
//!   slot 2  "site-hotspot"
//!   slot 3  ""
//!   slot 4  ""
//! ```
//!
//! Invariant: no two non-empty slots hold the same network name.

use heapless::String;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::CredentialError;

/// Number of credential slots.
pub const MAX_PROFILES: usize = 5;
/// Longest network name (SSID).
pub const NAME_MAX_LEN: usize = 32;
/// Longest network secret (WPA passphrase).
pub const SECRET_MAX_LEN: usize = 64;

const CRED_NAMESPACE: &str = "wifi";
const SLOT_KEYS: [&str; MAX_PROFILES] = ["slot0", "slot1", "slot2", "slot3", "slot4"];
/// Stored blob size: two length varints plus both strings at full length.
const SLOT_BLOB_LEN: usize = 2 + NAME_MAX_LEN + 2 + SECRET_MAX_LEN;

/// One stored network.  An empty `name` marks an empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CredentialProfile {
    pub name: String<NAME_MAX_LEN>,
    pub secret: String<SECRET_MAX_LEN>,
}

impl CredentialProfile {
    pub fn new(name: &str, secret: &str) -> Result<Self, CredentialError> {
        let mut p = Self::default();
        p.name.push_str(name).map_err(|_| CredentialError::TooLong)?;
        p.secret.push_str(secret).map_err(|_| CredentialError::TooLong)?;
        Ok(p)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Network baked into the image at build time from
/// `CRACKWATCH_WIFI_SSID` / `CRACKWATCH_WIFI_PASS`, if both were set.
pub fn build_time_profile() -> Option<CredentialProfile> {
    let name = option_env!("CRACKWATCH_WIFI_SSID").filter(|n| !n.is_empty())?;
    let secret = option_env!("CRACKWATCH_WIFI_PASS").unwrap_or("");
    match CredentialProfile::new(name, secret) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!("Credentials: build-time network ignored: {}", e);
            None
        }
    }
}

/// Slot-addressed credential storage over any [`StoragePort`].
pub struct CredentialStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Profile stored in `index`.  A never-written or unreadable slot is
    /// returned as an empty profile.
    pub fn load(&self, index: usize) -> Result<CredentialProfile, CredentialError> {
        let key = slot_key(index)?;
        let mut buf = [0u8; SLOT_BLOB_LEN];
        match self.storage.read(CRED_NAMESPACE, key, &mut buf) {
            Ok(n) => match postcard::from_bytes(&buf[..n]) {
                Ok(profile) => Ok(profile),
                Err(_) => {
                    warn!("Credentials: slot {} undecodable, treating as empty", index);
                    Ok(CredentialProfile::default())
                }
            },
            Err(StorageError::NotFound) => Ok(CredentialProfile::default()),
            Err(_) => Err(CredentialError::Storage),
        }
    }

    /// Overwrite slot `index`.  Storing an empty profile clears the slot.
    pub fn store(&mut self, index: usize, profile: &CredentialProfile) -> Result<(), CredentialError> {
        let key = slot_key(index)?;
        if !profile.is_empty() {
            if let Some(other) = self.find(&profile.name)? {
                if other != index {
                    return Err(CredentialError::DuplicateName);
                }
            }
        }

        let mut buf = [0u8; SLOT_BLOB_LEN];
        postcard::to_slice(profile, &mut buf).map_err(|_| CredentialError::TooLong)?;
        self.storage
            .write(CRED_NAMESPACE, key, &buf)
            .map_err(|_| CredentialError::Storage)?;
        if profile.is_empty() {
            info!("Credentials: slot {} cleared", index);
        } else {
            info!("Credentials: slot {} -> {}", index, profile.name);
        }
        Ok(())
    }

    /// Save `profile` where provisioning would put it: the slot already
    /// holding that name, else the first empty slot.  Returns the slot.
    pub fn provision(&mut self, profile: &CredentialProfile) -> Result<usize, CredentialError> {
        if profile.is_empty() {
            return Err(CredentialError::EmptyName);
        }
        let slot = match self.find(&profile.name)? {
            Some(slot) => slot,
            None => self.first_empty()?.ok_or(CredentialError::StoreFull)?,
        };
        self.store(slot, profile)?;
        Ok(slot)
    }

    /// Put `profile` into slot 0 if no slot holds anything yet.  Returns
    /// whether it was written; an existing store is never touched.
    pub fn seed(&mut self, profile: &CredentialProfile) -> Result<bool, CredentialError> {
        if profile.is_empty() {
            return Err(CredentialError::EmptyName);
        }
        for i in 0..MAX_PROFILES {
            if !self.load(i)?.is_empty() {
                return Ok(false);
            }
        }
        self.store(0, profile)?;
        Ok(true)
    }

    /// Factory reset: clear every slot.
    pub fn erase_all(&mut self) -> Result<(), CredentialError> {
        for key in SLOT_KEYS {
            self.storage
                .delete(CRED_NAMESPACE, key)
                .map_err(|_| CredentialError::Storage)?;
        }
        info!("Credentials: all slots erased");
        Ok(())
    }

    /// Non-empty profiles in priority order, with their slot index.
    pub fn profiles(&self) -> impl Iterator<Item = (usize, CredentialProfile)> + '_ {
        (0..MAX_PROFILES).filter_map(move |i| match self.load(i) {
            Ok(p) if !p.is_empty() => Some((i, p)),
            Ok(_) => None,
            Err(e) => {
                warn!("Credentials: slot {} unreadable: {}", i, e);
                None
            }
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn find(&self, name: &str) -> Result<Option<usize>, CredentialError> {
        for i in 0..MAX_PROFILES {
            if self.load(i)?.name.as_str() == name {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn first_empty(&self) -> Result<Option<usize>, CredentialError> {
        for i in 0..MAX_PROFILES {
            if self.load(i)?.is_empty() {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

fn slot_key(index: usize) -> Result<&'static str, CredentialError> {
    SLOT_KEYS.get(index).copied().ok_or(CredentialError::InvalidIndex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nvs::NvsAdapter;

    fn store() -> CredentialStore<NvsAdapter> {
        CredentialStore::new(NvsAdapter::new().unwrap())
    }

    fn profile(name: &str) -> CredentialProfile {
        CredentialProfile::new(name, "hunter22").unwrap()
    }

    #[test]
    fn fresh_store_is_empty() {
        let s = store();
        for i in 0..MAX_PROFILES {
            assert!(s.load(i).unwrap().is_empty());
        }
        assert_eq!(s.profiles().count(), 0);
    }

    #[test]
    fn store_then_load() {
        let mut s = store();
        s.store(2, &profile("site-hotspot")).unwrap();
        assert_eq!(s.load(2).unwrap(), profile("site-hotspot"));
        assert!(s.load(1).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut s = store();
        assert_eq!(s.load(MAX_PROFILES), Err(CredentialError::InvalidIndex));
        assert_eq!(s.store(7, &profile("x")), Err(CredentialError::InvalidIndex));
    }

    #[test]
    fn duplicate_name_in_other_slot_is_rejected() {
        let mut s = store();
        s.store(0, &profile("workshop")).unwrap();
        assert_eq!(s.store(3, &profile("workshop")), Err(CredentialError::DuplicateName));
        // Rewriting the same slot is allowed.
        s.store(0, &CredentialProfile::new("workshop", "new-secret").unwrap())
            .unwrap();
        assert_eq!(s.load(0).unwrap().secret.as_str(), "new-secret");
    }

    #[test]
    fn overlong_fields_are_rejected() {
        let long = "x".repeat(NAME_MAX_LEN + 1);
        assert_eq!(CredentialProfile::new(&long, "pw"), Err(CredentialError::TooLong));
        let long_secret = "y".repeat(SECRET_MAX_LEN + 1);
        assert_eq!(CredentialProfile::new("ok", &long_secret), Err(CredentialError::TooLong));
    }

    #[test]
    fn max_length_profile_fits_a_slot() {
        let mut s = store();
        let p = CredentialProfile::new(&"n".repeat(NAME_MAX_LEN), &"s".repeat(SECRET_MAX_LEN)).unwrap();
        s.store(4, &p).unwrap();
        assert_eq!(s.load(4).unwrap(), p);
    }

    #[test]
    fn provision_fills_first_empty_then_updates_in_place() {
        let mut s = store();
        assert_eq!(s.provision(&profile("a")).unwrap(), 0);
        assert_eq!(s.provision(&profile("b")).unwrap(), 1);
        assert_eq!(
            s.provision(&CredentialProfile::new("a", "rotated").unwrap()).unwrap(),
            0
        );
        assert_eq!(s.load(0).unwrap().secret.as_str(), "rotated");
    }

    #[test]
    fn seed_fills_slot_zero_of_an_empty_store() {
        let mut s = store();
        assert!(s.seed(&profile("factory")).unwrap());
        assert_eq!(s.load(0).unwrap(), profile("factory"));
    }

    #[test]
    fn seed_leaves_a_provisioned_store_alone() {
        let mut s = store();
        s.store(3, &profile("site")).unwrap();
        assert!(!s.seed(&profile("factory")).unwrap());
        assert!(s.load(0).unwrap().is_empty());
        assert_eq!(s.profiles().count(), 1);
    }

    #[test]
    fn provision_reports_full_store() {
        let mut s = store();
        for i in 0..MAX_PROFILES {
            s.provision(&profile(&format!("net{i}"))).unwrap();
        }
        assert_eq!(s.provision(&profile("one-more")), Err(CredentialError::StoreFull));
    }

    #[test]
    fn profiles_iterate_in_priority_order() {
        let mut s = store();
        s.store(3, &profile("c")).unwrap();
        s.store(0, &profile("a")).unwrap();
        let order: std::vec::Vec<usize> = s.profiles().map(|(i, _)| i).collect();
        assert_eq!(order, [0, 3]);
    }

    #[test]
    fn undecodable_slot_reads_as_empty() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write(CRED_NAMESPACE, "slot1", &[0xFF; 8]).unwrap();
        let s = CredentialStore::new(nvs);
        assert!(s.load(1).unwrap().is_empty());
    }

    #[test]
    fn erase_all_clears_every_slot() {
        let mut s = store();
        s.provision(&profile("a")).unwrap();
        s.provision(&profile("b")).unwrap();
        s.erase_all().unwrap();
        assert_eq!(s.profiles().count(), 0);
    }
}
