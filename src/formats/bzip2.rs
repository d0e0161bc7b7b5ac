//! bzip2 streams.

use crate::archive::{OpenResult, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::peek::PeekReader;

/// Stream header: `BZh` followed by the block size digit.
pub const MAGIC: &[u8] = b"BZh";

/// Catalog entry for bzip2.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "bzip2",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn open(stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    super::single::open("bzip2", Codec::Bzip2, stream)
}
