//! Fuzz target for a full explosion job over arbitrary bytes.
//!
//! Every layer the input manages to open is walked, so this reaches the
//! entry iteration code of each container as well as its open path.
//!
//! Run with: cargo +nightly fuzz run explode

#![no_main]

use libfuzzer_sys::fuzz_target;

use exploder::{ExplodeOptions, Exploder, MemorySink, ResourceLimits};

fuzz_target!(|data: &[u8]| {
    // Bounded so that decompression bombs do not stall the fuzzer.
    let limits = ResourceLimits::strict()
        .max_total_bytes(Some(64 << 20))
        .max_entries(Some(10_000));
    let options = ExplodeOptions::new().max_depth(Some(8)).limits(limits);
    let mut exploder = Exploder::with_sink(options, MemorySink::new());

    if let Err(e) = exploder.explode("out", data, Some(data.len() as u64)) {
        assert!(e.is_fatal(), "non-fatal error escaped: {e}");
    }
});
