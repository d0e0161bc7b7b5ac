//! Property-based tests using proptest.
//!
//! These tests check the invariants every job relies on: peeking never loses
//! bytes, entry paths never leave their parent, and no input makes a job
//! fail or produce nothing.

mod common;

use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path};

use proptest::prelude::*;

use exploder::{ExplodeOptions, PeekReader, entry_path};

/// Strategy for (offset, len) probes over a stream of up to `max` bytes.
fn probes(max: u64) -> impl Strategy<Value = Vec<(u64, usize)>> {
    proptest::collection::vec((0..max + 16, 0usize..64), 0..8)
}

/// Strategy for hostile path segments.
fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just(".".to_string()),
        Just(String::new()),
        Just("/".to_string()),
        "[a-zA-Z0-9_.-]{1,8}",
    ]
}

proptest! {
    /// Whatever was peeked, the committed stream replays the input exactly.
    #[test]
    fn replay_after_probes_is_exact(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        probes in probes(512),
    ) {
        let mut stream = PeekReader::new(&data[..]);
        for (offset, len) in probes {
            if let Some(window) = stream.peek_at(offset, len) {
                let start = offset as usize;
                prop_assert_eq!(window, &data[start..start + len]);
            }
        }
        prop_assert_eq!(stream.position(), 0);

        let mut replayed = Vec::new();
        stream.commit().read_to_end(&mut replayed).unwrap();
        prop_assert_eq!(replayed, data);
    }

    /// Committing after a seek replays from the seek target.
    #[test]
    fn replay_starts_at_position(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        peek in 0u64..600,
        start in 0u64..600,
    ) {
        let mut stream = PeekReader::new(&data[..]);
        let _ = stream.peek_at(peek, 1);
        stream.seek(SeekFrom::Start(start)).unwrap();

        let mut replayed = Vec::new();
        stream.commit().read_to_end(&mut replayed).unwrap();
        let from = (start as usize).min(data.len());
        prop_assert_eq!(replayed, &data[from..]);
    }

    /// Entry paths stay below their parent.
    #[test]
    fn entry_path_never_escapes(
        dir in proptest::collection::vec(segment(), 0..4),
        name in proptest::collection::vec(segment(), 0..3),
        ordinal in 1u64..100,
    ) {
        let parent = Path::new("out/job");
        let path = entry_path(parent, &dir.join("/"), &name.join("/"), ordinal);

        prop_assert!(path.starts_with(parent));
        prop_assert!(path != parent);
        let below = path.strip_prefix(parent).unwrap();
        prop_assert!(below.components().all(|c| matches!(c, Component::Normal(_))));
    }

    /// Arbitrary bytes never fail a job and always produce output.
    #[test]
    fn arbitrary_bytes_always_produce_output(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let (report, files) = common::explode_to_memory(&data, ExplodeOptions::new());
        prop_assert!(!files.is_empty());
        prop_assert!(report.files_written >= files.len() as u64);
    }

    /// Arbitrary bytes behind a valid signature never fail a job.
    #[test]
    fn signature_prefixed_garbage_always_produces_output(
        magic in prop_oneof![
            Just(&b"PK\x03\x04"[..]),
            Just(&b"\x1f\x8b\x08\x00"[..]),
            Just(&b"BZh9"[..]),
            Just(&b"\xfd7zXZ\x00"[..]),
            Just(&b"\x28\xb5\x2f\xfd"[..]),
            Just(&b"7z\xbc\xaf\x27\x1c"[..]),
            Just(&b"MSCF"[..]),
            Just(&b"!<arch>\n"[..]),
            Just(&b"\xed\xab\xee\xdb"[..]),
            Just(&b"070701"[..]),
        ],
        tail in proptest::collection::vec(any::<u8>(), 0..1024),
    ) {
        let mut data = magic.to_vec();
        data.extend(tail);
        let (_, files) = common::explode_to_memory(&data, ExplodeOptions::new());
        prop_assert!(!files.is_empty());
    }
}
