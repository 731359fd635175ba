#![no_main]

use libfuzzer_sys::fuzz_target;
use regsnap::{index::SecondaryIndices, merge, store::RecordStore};

fuzz_target!(|data: &[u8]| {
    let mut store = RecordStore::new();
    let mut indices = SecondaryIndices::new();
    let _ = merge::apply_dump(data, &mut store, &mut indices);
});
