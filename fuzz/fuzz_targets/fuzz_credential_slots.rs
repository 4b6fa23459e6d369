//! Fuzz target: credential slot decoding
//!
//! Writes arbitrary bytes into every NVS credential slot and walks the
//! store the way the connector does, verifying:
//! - No panics on undecodable or truncated slot blobs
//! - Every profile handed out respects the name/secret bounds
//! - Provisioning into a store of garbage either succeeds or fails cleanly
//!
//! cargo fuzz run fuzz_credential_slots

#![no_main]

use crackwatch::adapters::nvs::NvsAdapter;
use crackwatch::app::ports::StoragePort;
use crackwatch::credentials::{
    CredentialProfile, CredentialStore, MAX_PROFILES, NAME_MAX_LEN, SECRET_MAX_LEN,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut nvs) = NvsAdapter::new() else {
        return;
    };
    let chunk = (data.len() / MAX_PROFILES).max(1);
    for (i, blob) in data.chunks(chunk).take(MAX_PROFILES).enumerate() {
        let key = format!("slot{}", i);
        let _ = nvs.write("wifi", &key, blob);
    }

    let mut store = CredentialStore::new(nvs);
    for (slot, profile) in store.profiles() {
        assert!(slot < MAX_PROFILES);
        assert!(!profile.is_empty());
        assert!(profile.name.len() <= NAME_MAX_LEN);
        assert!(profile.secret.len() <= SECRET_MAX_LEN);
    }

    if let Ok(p) = CredentialProfile::new("fuzz-net", "password1") {
        if let Ok(slot) = store.provision(&p) {
            assert_eq!(store.load(slot).map(|l| l.name), Ok(p.name));
        }
    }
});
