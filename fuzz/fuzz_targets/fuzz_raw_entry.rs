//! Fuzz target for snapshot entry normalization.
//!
//! This fuzzer tests that:
//! 1. Any JSON object deserializes into a `RawEntry` without panicking
//! 2. Canonical records always carry a non-empty id and a finite rotation
//! 3. Only trusted `storageFile` values end up on the record
//!
//! Run with: `cargo +nightly fuzz run fuzz_raw_entry`

#![no_main]

use libfuzzer_sys::fuzz_target;
use photowall::wall::{ImageSource, RawEntry, canonicalize};

const NOW: i64 = 1_700_000_000_000;

fuzz_target!(|data: &[u8]| {
    let Ok(entry) = serde_json::from_slice::<RawEntry>(data) else {
        return;
    };

    let Some(canonical) = canonicalize(&entry, NOW) else {
        assert!(entry.id().is_none());
        return;
    };

    let record = &canonical.record;
    assert!(!record.id.trim().is_empty());
    assert!(record.rotation.is_finite());

    match &canonical.image {
        ImageSource::Stored(name) => {
            assert_eq!(record.storage_file.as_deref(), Some(name.as_str()));
        },
        _ => assert!(record.storage_file.is_none()),
    }

    // Canonical records always serialize
    let json = serde_json::to_string(record).expect("record serializes");
    assert!(json.contains("\"id\""));
});
