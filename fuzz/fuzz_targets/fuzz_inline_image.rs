//! Fuzz target for inline image decoding.
//!
//! This fuzzer tests that:
//! 1. Arbitrary data URLs and bare base64 never panic
//! 2. A decoded image is never empty and always has an image/* type
//! 3. The size estimate used for early rejection never undercounts
//!
//! Run with: `cargo +nightly fuzz run fuzz_inline_image`

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use photowall::wall::{decode_inline_image, estimated_decoded_len};

#[derive(Arbitrary, Debug)]
struct ImageInput {
    /// Header between `data:` and the comma, e.g. `image/png;base64`
    header: String,
    payload: String,
    /// Whether to wrap the payload in a data URL
    as_data_url: bool,
}

fuzz_target!(|input: ImageInput| {
    let text = if input.as_data_url {
        format!("data:{},{}", input.header, input.payload)
    } else {
        input.payload.clone()
    };

    if let Ok(image) = decode_inline_image(&text) {
        assert!(!image.bytes.is_empty());
        assert!(image.mime.starts_with("image/"));
        assert!(matches!(image.extension(), "png" | "jpg"));

        // The estimate may exceed the real size, never fall below it
        assert!(estimated_decoded_len(&text) >= image.bytes.len());
    }
});
