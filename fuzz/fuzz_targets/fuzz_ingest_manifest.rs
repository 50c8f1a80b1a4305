//! Fuzz target: multi-document manifest ingestion.
//!
//! Arbitrary bytes go through the YAML reader. Ingestion may reject the
//! input but must never panic, and whatever it accepts must digest and
//! plan cleanly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use seaman_core::{Objects, Release, ReleaseName, ReleasePlan};

fuzz_target!(|data: &[u8]| {
    let name = ReleaseName::new("fuzz").expect("static name is valid");
    let mut release = Release::new(name);
    if release.ingest_objects(data).is_err() {
        return;
    }

    let hex = release.digest().to_string();
    assert_eq!(hex.len(), 64, "digest must render as 64 hex chars");

    let plan = ReleasePlan::new(&release.name, &release.objects, &Objects::new());
    assert_eq!(plan.creations.len(), release.objects.len());
    assert_eq!(plan.undo().deletions.len(), plan.creations.len());
});
