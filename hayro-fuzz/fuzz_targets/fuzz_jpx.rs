#![no_main]

use hayro_jpx::{DecodeRequest, classify, decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = classify(data);

    let request = DecodeRequest {
        ignore_palette_metadata: data.last().is_some_and(|b| b & 1 == 1),
        ..DecodeRequest::new(data)
    };

    if let Ok(image) = decode(&request) {
        let _ = image.into_dynamic_image();
    }
});
