#![no_main]

use libfuzzer_sys::fuzz_target;
use roost_core::core_loadable::{SnapshotCache, StoreItem};
use roost_core::core_model::DirectedPost;
use std::path::PathBuf;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes on disk must read as a miss or a list of valid posts
    let path = std::env::temp_dir().join(format!("roost-fuzz-{}.json", std::process::id()));
    if std::fs::write(&path, data).is_err() {
        return;
    }

    let cache = SnapshotCache::<DirectedPost>::at(PathBuf::from(&path));
    if let Some(items) = cache.load() {
        assert!(items.iter().all(StoreItem::is_valid));
    }
    let _ = std::fs::remove_file(&path);
});
