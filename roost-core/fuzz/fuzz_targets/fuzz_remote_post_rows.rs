#![no_main]

use libfuzzer_sys::fuzz_target;
use roost_core::core_model::RemotePost;

fuzz_target!(|data: &[u8]| {
    // Rows come straight off the wire
    if let Ok(rows) = serde_json::from_slice::<Vec<RemotePost>>(data) {
        for row in rows {
            let _ = row.into_post();
        }
    }
});
