#![no_main]

use libfuzzer_sys::fuzz_target;
use roost_core::core_filter::{Cipher, ContentFilter};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let cipher = Cipher::default();
    if text.is_ascii() {
        assert_eq!(cipher.decode(&cipher.encode(text)), text.to_ascii_lowercase());
    }

    let filter = ContentFilter::default();
    filter.enable_with_bundled();
    let _ = filter.contains(text);

    // Keys are also user input via config
    let _ = Cipher::new(text);
});
