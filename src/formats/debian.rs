//! Debian packages (`ar` archives).
//!
//! A `.deb` is an `ar` archive holding `debian-binary`, `control.tar.*` and
//! `data.tar.*`. Only the tar members are yielded, and each is yielded
//! already decompressed according to its file extension, so the next layer
//! down sees plain tar bytes. A member whose extension names no known codec
//! is yielded raw and left to the catalog. Entries are placed under `.` with
//! the member name, e.g. `./data.tar.xz`.

use std::io::{Seek, SeekFrom};

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::bounded::{Payload, read_up_to, skip};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Global `ar` header.
pub const MAGIC: &[u8] = b"!<arch>\n";

const HEADER_LEN: usize = 60;
const HEADER_END: &[u8] = b"`\n";
/// BSD `ar` stores long names after the header, announced by this prefix.
const BSD_LONG_NAME: &str = "#1/";
const MAX_NAME_LEN: u64 = 4096;

/// Catalog entry for Debian packages.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "debian",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

fn open(mut stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    let first = match stream.peek_at(MAGIC.len() as u64, HEADER_LEN) {
        Some(block) => parse_header(block).map(drop),
        None => Err(Error::invalid("debian", "archive has no members")),
    };
    if let Err(e) = first {
        return Err(Rejected::new(e, stream));
    }
    if let Err(e) = stream.seek(SeekFrom::Start(MAGIC.len() as u64)) {
        return Err(Rejected::new(e.into(), stream));
    }
    Ok(Box::new(DebianArchive {
        reader: stream.commit(),
        remaining: 0,
        padding: 0,
        eof: false,
    }))
}

/// An `ar` member header.
#[derive(Debug, PartialEq, Eq)]
struct MemberHeader {
    name: String,
    size: u64,
}

fn parse_header(block: &[u8]) -> Result<MemberHeader> {
    if block.len() < HEADER_LEN || &block[58..60] != HEADER_END {
        return Err(Error::invalid("debian", "bad member header terminator"));
    }
    let name = String::from_utf8_lossy(&block[0..16]).trim_end().to_string();
    let size = std::str::from_utf8(&block[48..58])
        .ok()
        .and_then(|field| field.trim().parse::<u64>().ok())
        .ok_or_else(|| Error::invalid("debian", format!("bad size for member '{name}'")))?;
    Ok(MemberHeader { name, size })
}

/// Returns `true` for `name.tar` and `name.tar.<ext>` members.
fn is_tar_member(name: &str) -> bool {
    let stem = match name.rsplit_once('.') {
        Some((stem, "tar")) => return !stem.is_empty(),
        Some((stem, _)) => stem,
        None => return false,
    };
    stem.rsplit_once('.')
        .is_some_and(|(base, ext)| ext == "tar" && !base.is_empty())
}

/// A Debian package session.
pub struct DebianArchive<R> {
    reader: R,
    remaining: u64,
    padding: u64,
    eof: bool,
}

impl<R: std::io::Read> DebianArchive<R> {
    /// Reads member headers until the next tar member.
    fn next_member(&mut self) -> Result<Option<MemberHeader>> {
        skip(&mut self.reader, self.remaining + self.padding)?;
        self.remaining = 0;
        self.padding = 0;

        loop {
            let mut block = [0u8; HEADER_LEN];
            match read_up_to(&mut self.reader, &mut block)? {
                0 => return Ok(None),
                HEADER_LEN => {}
                _ => return Err(Error::invalid("debian", "truncated member header")),
            }
            let mut header = parse_header(&block)?;
            let padding = header.size % 2;

            if let Some(len) = header.name.strip_prefix(BSD_LONG_NAME) {
                let len: u64 = len
                    .parse()
                    .map_err(|_| Error::invalid("debian", "bad BSD long name length"))?;
                if len > header.size || len > MAX_NAME_LEN {
                    return Err(Error::invalid("debian", "BSD long name out of range"));
                }
                let mut name = vec![0u8; len as usize];
                self.reader.read_exact(&mut name)?;
                header.name = String::from_utf8_lossy(cstr(&name)).into_owned();
                header.size -= len;
            }
            let name = header.name.trim_end_matches('/');

            if is_tar_member(name) {
                self.remaining = header.size;
                self.padding = padding;
                return Ok(Some(MemberHeader {
                    name: name.to_string(),
                    size: header.size,
                }));
            }
            log::debug!("skipping debian member '{}'", header.name);
            skip(&mut self.reader, header.size + padding)?;
        }
    }
}

impl<R: std::io::Read> Archive for DebianArchive<R> {
    fn format(&self) -> &'static str {
        "debian"
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        if self.eof {
            return Ok(None);
        }
        let member = match self.next_member() {
            Ok(Some(member)) => member,
            Ok(None) => {
                self.eof = true;
                return Ok(None);
            }
            Err(e) => {
                self.eof = true;
                return Err(e);
            }
        };

        let ext = member.name.rsplit_once('.').map_or("", |(_, ext)| ext);
        let codec = Codec::from_extension(ext).unwrap_or_else(|| {
            log::debug!("debian member '{}' has no known codec, yielding it raw", member.name);
            Codec::Identity
        });
        let payload = Payload::new(&mut self.reader, &mut self.remaining);
        let reader = codec
            .decoder(payload)
            .map_err(|e| Error::invalid("debian", format!("{}: {e}", member.name)))?;
        Ok(Some(Entry::new(".", member.name, reader)))
    }
}

fn cstr(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(i) => &bytes[..i],
        None => bytes,
    }
}
