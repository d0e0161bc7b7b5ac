//! Zstandard streams.

use crate::archive::{OpenResult, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::peek::PeekReader;

/// Little-endian frame magic `0xFD2FB528`.
pub const MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

/// Catalog entry for zstd.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "zstd",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn open(stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    super::single::open("zstd", Codec::Zstd, stream)
}
