//! zip containers.
//!
//! zip is read from its central directory at the end of the file, so the
//! decoder needs the archive's length. The stream is wrapped in a
//! [`SizedView`] whose end is the declared size, or a small estimate when
//! the size is unknown.

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::bounded::SizedView;
use crate::catalog::FormatDescriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Local file header prefix shared by every zip variant.
pub const MAGIC: &[u8] = b"PK";

/// Catalog entry for zip.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "zip",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn open(mut stream: PeekReader<'_>, size: SizeHint) -> OpenResult<'_> {
    let len = size.resolve(&mut stream);
    let probed = ::zip::ZipArchive::new(SizedView::new(&mut stream, len)).map(drop);
    if let Err(e) = probed {
        return Err(Rejected::new(Error::invalid("zip", e.to_string()), stream));
    }
    match ::zip::ZipArchive::new(SizedView::new(stream, len)) {
        Ok(archive) => Ok(Box::new(ZipArchive { archive, next: 0 })),
        Err(e) => Err(Rejected::consumed(Error::invalid("zip", e.to_string()))),
    }
}

/// A zip session.
pub struct ZipArchive<'a> {
    archive: ::zip::ZipArchive<SizedView<PeekReader<'a>>>,
    next: usize,
}

impl Archive for ZipArchive<'_> {
    fn format(&self) -> &'static str {
        "zip"
    }

    fn is_eof(&self) -> bool {
        self.next >= self.archive.len()
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        while self.next < self.archive.len() {
            let index = self.next;
            self.next += 1;
            let is_dir = self
                .archive
                .name_for_index(index)
                .is_none_or(|name| name.ends_with('/'));
            if is_dir {
                continue;
            }

            let file = self
                .archive
                .by_index(index)
                .map_err(|e| Error::invalid("zip", format!("entry {index}: {e}")))?;
            let name = file.name().to_string();
            let size = file.size();
            return Ok(Some(Entry::from_path(&name, file).with_size(Some(size))));
        }
        Ok(None)
    }
}
