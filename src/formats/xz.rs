//! xz streams.

use crate::archive::{OpenResult, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::peek::PeekReader;

/// xz stream header magic.
pub const MAGIC: &[u8] = &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];

/// Catalog entry for xz.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "xz",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn open(stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    super::single::open("xz", Codec::Xz, stream)
}
