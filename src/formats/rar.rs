//! RAR archives, through the unrar library.
//!
//! unrar only opens archives by path, so the stream is spooled to a
//! temporary file first. When the spooled archive does not open, the spool
//! itself becomes the stream handed back for the verbatim write.

use std::io::{self, Cursor, Seek};

use tempfile::NamedTempFile;
use unrar::{CursorBeforeHeader, OpenArchive, Process};

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Prefix shared by RAR 1.5 through RAR 5 signatures.
pub const MAGIC: &[u8] = &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07];

/// Catalog entry for RAR.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "rar",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn spool(stream: PeekReader<'_>) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    io::copy(&mut stream.commit(), &mut file)?;
    file.rewind()?;
    Ok(file)
}

fn open(stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    let spooled = match spool(stream) {
        Ok(file) => file,
        Err(e) => return Err(Rejected::consumed(Error::from(e))),
    };
    match unrar::Archive::new(spooled.path()).open_for_processing() {
        Ok(archive) => Ok(Box::new(RarArchive {
            archive: Some(archive),
            _spool: spooled,
        })),
        Err(e) => {
            let error = Error::invalid("rar", e.to_string());
            let mut file = spooled.into_file();
            match file.rewind() {
                Ok(()) => Err(Rejected::new(error, PeekReader::new(file))),
                Err(_) => Err(Rejected::consumed(error)),
            }
        }
    }
}

/// A RAR session. The spool lives as long as the session.
pub struct RarArchive {
    archive: Option<OpenArchive<Process, CursorBeforeHeader>>,
    _spool: NamedTempFile,
}

impl Archive for RarArchive {
    fn format(&self) -> &'static str {
        "rar"
    }

    fn is_eof(&self) -> bool {
        self.archive.is_none()
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        let invalid = |e: unrar::error::UnrarError| Error::invalid("rar", e.to_string());
        let Some(mut archive) = self.archive.take() else {
            return Ok(None);
        };
        while let Some(header) = archive.read_header().map_err(invalid)? {
            let entry = header.entry();
            if !entry.is_file() {
                archive = header.skip().map_err(invalid)?;
                continue;
            }
            let path = entry.filename.to_string_lossy().replace('\\', "/");
            let (data, rest) = header.read().map_err(invalid)?;
            self.archive = Some(rest);
            let size = data.len() as u64;
            return Ok(Some(Entry::from_path(&path, Cursor::new(data)).with_size(Some(size))));
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.archive = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_signature() {
        let rar5 = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00];
        assert!(test(&mut PeekReader::new(&rar5[..])));
        assert!(!test(&mut PeekReader::new(&b"Rar!"[..])));
    }

    #[test]
    fn test_garbage_never_yields_entries() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(b"\x01\x00not really a rar archive");
        match open(PeekReader::new(&data[..]), SizeHint::new(None, 2048)) {
            Ok(mut archive) => assert!(!matches!(archive.next_entry(), Ok(Some(_)))),
            Err(rejected) => {
                let mut replay = Vec::new();
                rejected
                    .stream
                    .expect("spool returned")
                    .commit()
                    .read_to_end(&mut replay)
                    .unwrap();
                assert_eq!(replay, data);
            }
        }
    }
}
