//! Fuzz target for photowall.toml parsing.
//!
//! This fuzzer tests the TOML config parser to ensure:
//! 1. No input causes a panic
//! 2. Malformed TOML is gracefully rejected
//! 3. A config that passes validation yields a usable wall config
//!
//! Run with: `cargo +nightly fuzz run fuzz_config_parsing`

#![no_main]

use libfuzzer_sys::fuzz_target;
use photowall::config::Config;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = toml::from_str::<Config>(text) else {
        return;
    };

    if config.validate().is_ok() {
        let wall = config.to_wall_config();
        assert!(wall.max_photos > 0);
        assert!(wall.max_concurrent_uploads > 0);
        assert!(wall.max_image_bytes > 0);
        assert_ne!(config.server.port, 0);
    }
});
