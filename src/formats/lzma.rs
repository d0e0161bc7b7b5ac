//! Raw LZMA streams in the `.lzma` ("LZMA alone") container.
//!
//! The container has no magic number. The header starts with the
//! properties byte, which is `0x5D` (lc=3, lp=0, pb=2) for every common
//! encoder, followed by a little-endian dictionary size. Only the
//! dictionary sizes produced by standard presets are accepted, which keeps
//! the signature from matching arbitrary data.

use crate::archive::{OpenResult, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::peek::PeekReader;

/// Properties byte and the low dictionary-size bytes shared by all presets.
const PREFIX: &[u8] = &[0x5D, 0x00, 0x00];

/// Accepted upper dictionary-size bytes (64 KiB to 32 MiB).
const DICT_SUFFIXES: [[u8; 2]; 8] = [
    [0x01, 0x00],
    [0x10, 0x00],
    [0x08, 0x00],
    [0x20, 0x00],
    [0x40, 0x00],
    [0x80, 0x00],
    [0x00, 0x01],
    [0x00, 0x02],
];

/// Catalog entry for lzma.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "lzma",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    match stream.peek_at(0, 5) {
        Some(head) => {
            head.starts_with(PREFIX) && DICT_SUFFIXES.iter().any(|suffix| head[3..5] == suffix[..])
        }
        None => false,
    }
}

fn open(stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    super::single::open("lzma", Codec::Lzma, stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_requires_known_dictionary() {
        let mut stream = PeekReader::new(&[0x5D, 0x00, 0x00, 0x80, 0x00, 0xFF][..]);
        assert!(test(&mut stream));

        let mut stream = PeekReader::new(&[0x5D, 0x00, 0x00, 0x03, 0x00, 0xFF][..]);
        assert!(!test(&mut stream));

        let mut stream = PeekReader::new(&[0x5D, 0x00, 0x00, 0x80][..]);
        assert!(!test(&mut stream));
    }
}
