//! 7z containers.
//!
//! Like zip, 7z keeps its header at the end of the file, so the stream is
//! wrapped in a fixed-length [`SizedView`]. Entries are decoded whole,
//! since members of a solid block cannot be streamed independently.

use std::io::Cursor;

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::bounded::SizedView;
use crate::catalog::FormatDescriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// 7z signature: `'7' 'z' 0xBC 0xAF 0x27 0x1C`.
pub const MAGIC: &[u8] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Catalog entry for 7z.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "7zip",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn open(mut stream: PeekReader<'_>, size: SizeHint) -> OpenResult<'_> {
    let len = size.resolve(&mut stream);
    let probed = zesven::Archive::open(SizedView::new(&mut stream, len)).map(drop);
    if let Err(e) = probed {
        return Err(Rejected::new(Error::invalid("7zip", e.to_string()), stream));
    }
    match zesven::Archive::open(SizedView::new(stream, len)) {
        Ok(archive) => Ok(Box::new(SevenZipArchive { archive, next: 0 })),
        Err(e) => Err(Rejected::consumed(Error::invalid("7zip", e.to_string()))),
    }
}

/// A 7z session.
pub struct SevenZipArchive<'a> {
    archive: zesven::Archive<SizedView<PeekReader<'a>>>,
    next: usize,
}

impl Archive for SevenZipArchive<'_> {
    fn format(&self) -> &'static str {
        "7zip"
    }

    fn is_eof(&self) -> bool {
        self.next >= self.archive.len()
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        while let Some(entry) = self.archive.entries().get(self.next) {
            let index = self.next;
            self.next += 1;
            if entry.is_directory {
                continue;
            }
            let path = entry.path.as_str().to_string();
            let data = self
                .archive
                .extract_entry_to_vec_by_index(index)
                .map_err(|e| Error::invalid("7zip", format!("{path}: {e}")))?;
            let size = data.len() as u64;
            return Ok(Some(Entry::from_path(&path, Cursor::new(data)).with_size(Some(size))));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zesven::{ArchivePath, Writer};

    #[test]
    fn test_single_entry() {
        let mut writer = Writer::create(Cursor::new(Vec::new())).unwrap();
        writer
            .add_bytes(ArchivePath::new("docs/a.txt").unwrap(), b"seven")
            .unwrap();
        let (_, cursor) = writer.finish_into_inner().unwrap();
        let data = cursor.into_inner();

        let hint = SizeHint::new(Some(data.len() as u64), 2048);
        let Ok(mut archive) = open(PeekReader::new(&data[..]), hint) else {
            panic!("rejected");
        };
        let mut entry = archive.next_entry().unwrap().unwrap();
        assert_eq!(entry.dir(), "docs/");
        assert_eq!(entry.name(), "a.txt");
        let mut out = Vec::new();
        entry.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"seven");
    }
}
