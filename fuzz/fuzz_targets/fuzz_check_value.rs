//! Fuzz target: structural subset comparison.
//!
//! Any JSON value must be a subset of itself, and a reported mismatch path
//! must never be longer than the input nesting allows.

#![no_main]

use libfuzzer_sys::fuzz_target;
use seaman_core::verify::check_value;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let half = data.len() / 2;
    let (Ok(desired), Ok(actual)) = (
        serde_json::from_slice::<Value>(&data[..half]),
        serde_json::from_slice::<Value>(&data[half..]),
    ) else {
        return;
    };

    assert!(check_value(&desired, &desired).is_ok(), "a value must match itself");

    if let Err(path) = check_value(&desired, &actual) {
        assert!(path.len() <= data.len(), "mismatch path cannot outgrow the input");
    }
});
