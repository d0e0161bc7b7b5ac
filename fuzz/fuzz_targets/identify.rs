//! Fuzz target for signature tests and stream replay.
//!
//! Run with: cargo +nightly fuzz run identify

#![no_main]

use std::io::Read;

use libfuzzer_sys::fuzz_target;

use exploder::{Catalog, PeekReader};

fuzz_target!(|data: &[u8]| {
    let catalog = Catalog::builtin();
    let mut stream = PeekReader::new(data);
    let _ = catalog.identify(&mut stream);

    // Identification must leave the stream replayable from the start.
    let mut replayed = Vec::new();
    stream.commit().read_to_end(&mut replayed).unwrap();
    assert_eq!(replayed, data);
});
