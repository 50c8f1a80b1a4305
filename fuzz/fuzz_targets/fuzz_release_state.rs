//! Fuzz target: decoding a stored release state.
//!
//! The state payload lives in a ConfigMap anyone with write access can
//! edit, so decoding arbitrary text must fail cleanly, never panic.

#![no_main]

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use libfuzzer_sys::fuzz_target;
use seaman_core::state::STATE_KEY;
use seaman_core::{ReleaseName, ReleaseState};

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };

    let mut config_map = ConfigMap::default();
    config_map.metadata.name = Some("fuzz".to_owned());
    config_map.data = Some(BTreeMap::from([(STATE_KEY.to_owned(), payload.to_owned())]));

    let Ok(state) = ReleaseState::from_config_map(&config_map) else {
        return;
    };

    // Anything accepted must encode again.
    let name = ReleaseName::new("fuzz").expect("static name is valid");
    state.to_config_map(&name).expect("decoded state must re-encode");
});
