//! tar containers, read with the `tar` crate.
//!
//! Only regular files are yielded. Directories, links, devices, FIFOs,
//! contiguous and sparse files are skipped. GNU long names (`L`) and PAX
//! `path` records are applied by the crate, which also verifies every
//! header checksum.
//!
//! A `tar::Entry` borrows the `tar::Archive` it came from, and the crate
//! only iterates from the first byte it was given. The session therefore
//! starts a fresh `tar::Archive` at every header boundary and tracks the
//! stream offset itself, so an entry the consumer left unread is skipped
//! before the next header is read.
//!
//! The crate buffers long names and PAX records whole. Reads made while
//! walking from one file header to the next are capped at
//! [`MAX_HEADER_WALK`] bytes.

use std::cell::Cell;
use std::io::{self, Read, Seek};
use std::rc::Rc;

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::bounded::{Exact, skip};
use crate::catalog::FormatDescriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Size of a tar header and of the padding unit for payloads.
pub const BLOCK_LEN: u64 = 512;
/// Offset of the ustar magic within a header.
pub const MAGIC_OFFSET: u64 = 257;
/// ustar magic; GNU tar writes `ustar  \0`, POSIX `ustar\0`.
pub const MAGIC: &[u8] = b"ustar";
/// Bytes of headers and metadata records allowed before a file header.
pub const MAX_HEADER_WALK: u64 = 1 << 20;

/// Catalog entry for tar.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "tar",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(MAGIC_OFFSET, MAGIC)
}

/// Reads the first header, including any long-name or PAX records before it.
fn probe(stream: &mut PeekReader<'_>) -> io::Result<()> {
    let ceiling = Rc::new(Cell::new(MAX_HEADER_WALK));
    let mut archive = ::tar::Archive::new(Counted::new(stream, ceiling));
    let mut entries = archive.entries()?;
    entries.next().transpose()?;
    Ok(())
}

fn open(mut stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    let probed = probe(&mut stream);
    if let Err(e) = stream.rewind() {
        return Err(Rejected::new(e.into(), stream));
    }
    if let Err(e) = probed {
        return Err(Rejected::new(Error::invalid("tar", e.to_string()), stream));
    }
    Ok(Box::new(TarArchive::new(stream.commit())))
}

/// Counts the bytes taken from the container stream and refuses to read
/// past a movable ceiling.
struct Counted<R> {
    inner: R,
    pos: u64,
    ceiling: Rc<Cell<u64>>,
}

impl<R> Counted<R> {
    fn new(inner: R, ceiling: Rc<Cell<u64>>) -> Self {
        Self {
            inner,
            pos: 0,
            ceiling,
        }
    }
}

impl<R: Read> Read for Counted<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let room = self.ceiling.get().saturating_sub(self.pos);
        if room == 0 && !out.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("more than {MAX_HEADER_WALK} bytes of headers before a file entry"),
            ));
        }
        let len = out.len().min(usize::try_from(room).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut out[..len])?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// A tar session over any forward-only reader.
pub struct TarArchive<R: Read> {
    archive: Option<::tar::Archive<Counted<R>>>,
    /// Stream offset the current `tar::Archive` started at.
    base: u64,
    /// Stream offset of the header after the last yielded entry.
    next_header: u64,
    /// Read ceiling shared with the `Counted` reader.
    ceiling: Rc<Cell<u64>>,
    eof: bool,
}

impl<R: Read> TarArchive<R> {
    /// Creates a session positioned at the first header.
    pub fn new(reader: R) -> Self {
        let ceiling = Rc::new(Cell::new(u64::MAX));
        Self {
            archive: Some(::tar::Archive::new(Counted::new(reader, Rc::clone(&ceiling)))),
            base: 0,
            next_header: 0,
            ceiling,
            eof: false,
        }
    }

    /// Skips what is left of the previous entry and restarts the crate
    /// reader at the next header.
    fn rebase(&mut self) -> Result<()> {
        let Some(archive) = self.archive.take() else {
            return Ok(());
        };
        let mut reader = archive.into_inner();
        let remaining = self.next_header.saturating_sub(reader.pos);
        skip(&mut reader, remaining)?;
        self.base = reader.pos;
        self.archive = Some(::tar::Archive::new(reader));
        Ok(())
    }
}

impl<R: Read> Archive for TarArchive<R> {
    fn format(&self) -> &'static str {
        "tar"
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        if self.eof {
            return Ok(None);
        }
        if let Err(e) = self.rebase() {
            self.eof = true;
            return Err(e);
        }

        let Self {
            archive,
            base,
            next_header,
            ceiling,
            eof,
        } = self;
        ceiling.set(*base + MAX_HEADER_WALK);
        let Some(archive) = archive.as_mut() else {
            *eof = true;
            return Ok(None);
        };
        let mut entries = match archive.entries() {
            Ok(entries) => entries,
            Err(e) => {
                *eof = true;
                return Err(e.into());
            }
        };

        loop {
            let entry = match entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    *eof = true;
                    return Err(Error::invalid("tar", e.to_string()));
                }
                None => {
                    *eof = true;
                    return Ok(None);
                }
            };

            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let kind = entry.header().entry_type();
            let size = entry.size();
            let end = *base + entry.raw_file_position() + size.next_multiple_of(BLOCK_LEN);
            if !kind.is_file() || path.ends_with('/') {
                log::debug!("skipping tar member '{path}' of type {kind:?}");
                ceiling.set(end.saturating_add(MAX_HEADER_WALK));
                continue;
            }

            *next_header = end;
            ceiling.set(u64::MAX);
            return Ok(Some(
                Entry::from_path(&path, Exact::new(entry, size)).with_size(Some(size)),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn append_file(builder: &mut ::tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
        let mut header = ::tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(::tar::EntryType::Regular);
        builder.append_data(&mut header, path, data).unwrap();
    }

    fn collect<R: Read>(archive: &mut TarArchive<R>) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(mut entry) = archive.next_entry().unwrap() {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((format!("{}{}", entry.dir(), entry.name()), data));
        }
        out
    }

    #[test]
    fn test_regular_files_only() {
        let mut builder = ::tar::Builder::new(Vec::new());
        let mut dir = ::tar::Header::new_gnu();
        dir.set_entry_type(::tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        builder.append_data(&mut dir, "docs/", io::empty()).unwrap();
        append_file(&mut builder, "docs/a.txt", b"alpha");
        let mut link = ::tar::Header::new_gnu();
        link.set_entry_type(::tar::EntryType::Symlink);
        link.set_size(0);
        link.set_link_name("a.txt").unwrap();
        builder
            .append_data(&mut link, "docs/b.txt", io::empty())
            .unwrap();
        append_file(&mut builder, "c.txt", b"gamma");
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data));
        assert_eq!(
            collect(&mut archive),
            vec![
                ("docs/a.txt".to_string(), b"alpha".to_vec()),
                ("c.txt".to_string(), b"gamma".to_vec()),
            ]
        );
        assert!(archive.is_eof());
    }

    #[test]
    fn test_gnu_long_name() {
        let long = format!("{}/file.txt", "d".repeat(150));
        let mut builder = ::tar::Builder::new(Vec::new());
        append_file(&mut builder, &long, b"long");
        append_file(&mut builder, "after.txt", b"next");
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data));
        assert_eq!(
            collect(&mut archive),
            vec![(long, b"long".to_vec()), ("after.txt".to_string(), b"next".to_vec())]
        );
    }

    #[test]
    fn test_pax_path_applied() {
        let record = b"26 path=deep/pax/name.txt\n";
        let mut builder = ::tar::Builder::new(Vec::new());
        let mut pax = ::tar::Header::new_ustar();
        pax.set_entry_type(::tar::EntryType::XHeader);
        pax.set_size(record.len() as u64);
        pax.set_mode(0o644);
        builder
            .append_data(&mut pax, "PaxHeader/name.txt", &record[..])
            .unwrap();
        let mut file = ::tar::Header::new_ustar();
        file.set_entry_type(::tar::EntryType::Regular);
        file.set_size(3);
        file.set_mode(0o644);
        builder.append_data(&mut file, "name.txt", &b"pax"[..]).unwrap();
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data));
        assert_eq!(
            collect(&mut archive),
            vec![("deep/pax/name.txt".to_string(), b"pax".to_vec())]
        );
    }

    #[test]
    fn test_oversized_long_name_rejected() {
        let long = "n".repeat(MAX_HEADER_WALK as usize + 1);
        let mut builder = ::tar::Builder::new(Vec::new());
        append_file(&mut builder, &long, b"x");
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data));
        assert!(archive.next_entry().is_err());
        assert!(archive.is_eof());
    }

    #[test]
    fn test_large_skipped_member_within_walk() {
        let mut builder = ::tar::Builder::new(Vec::new());
        let mut contiguous = ::tar::Header::new_gnu();
        contiguous.set_entry_type(::tar::EntryType::Continuous);
        contiguous.set_size(MAX_HEADER_WALK + 4096);
        contiguous.set_mode(0o644);
        builder
            .append_data(&mut contiguous, "big.bin", io::repeat(0).take(MAX_HEADER_WALK + 4096))
            .unwrap();
        append_file(&mut builder, "after.txt", b"after");
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data));
        assert_eq!(
            collect(&mut archive),
            vec![("after.txt".to_string(), b"after".to_vec())]
        );
    }

    #[test]
    fn test_unread_payload_skipped() {
        let mut builder = ::tar::Builder::new(Vec::new());
        append_file(&mut builder, "a.txt", &[7u8; 1500]);
        append_file(&mut builder, "b.txt", b"bravo");
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data));
        let mut first = archive.next_entry().unwrap().unwrap();
        let mut partial = [0u8; 10];
        first.read_exact(&mut partial).unwrap();
        drop(first);
        let mut second = archive.next_entry().unwrap().unwrap();
        assert_eq!(second.name(), "b.txt");
        let mut out = Vec::new();
        second.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"bravo");
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut builder = ::tar::Builder::new(Vec::new());
        append_file(&mut builder, "a.txt", b"alpha");
        let mut data = builder.into_inner().unwrap();
        data[0] ^= 0x01;

        match open(PeekReader::new(&data[..]), SizeHint::new(None, 2048)) {
            Ok(_) => panic!("accepted"),
            Err(rejected) => assert!(rejected.stream.is_some()),
        }
    }

    #[test]
    fn test_truncated_payload_errors() {
        let mut builder = ::tar::Builder::new(Vec::new());
        append_file(&mut builder, "a.txt", &[1u8; 2000]);
        let data = builder.into_inner().unwrap();

        let mut archive = TarArchive::new(Cursor::new(data[..1000].to_vec()));
        let mut entry = archive.next_entry().unwrap().unwrap();
        let mut out = Vec::new();
        let err = entry.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(out.len(), 1000 - BLOCK_LEN as usize);
        drop(entry);

        assert!(archive.next_entry().is_err());
        assert!(archive.is_eof());
    }
}
