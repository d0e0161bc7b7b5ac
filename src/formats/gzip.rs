//! gzip streams, including BGZF.
//!
//! A plain gzip file may hold several concatenated members; Alpine `.apk`
//! packages, for instance, are three gzipped tar streams back to back. Each
//! member is yielded as its own entry (`pt_1`, `pt_2`, ...), so every member
//! is inspected separately one layer down.
//!
//! BGZF (blocked gzip, used by bioinformatics tools) also consists of many
//! members, but they are arbitrary 64 KiB slices of a single logical stream.
//! BGZF is recognised by the `BC` extra subfield of its first member and is
//! decoded as one continuous `pt_1`.

use std::io::{self, BufRead, BufReader, Seek};

use flate2::bufread::GzDecoder;

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::peek::{PeekReader, Replay};

/// gzip member magic.
pub const MAGIC: &[u8] = &[0x1F, 0x8B];

const METHOD_DEFLATE: u8 = 8;
const FLAG_EXTRA: u8 = 0x04;
/// Fixed member header length up to and including `XLEN`.
const HEADER_WITH_XLEN: u64 = 12;

/// Catalog entry for gzip and BGZF.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "gzip",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

/// Returns `true` if the first member carries the BGZF `BC` subfield.
fn is_bgzf(stream: &mut PeekReader<'_>) -> bool {
    let xlen = match stream.peek_at(0, HEADER_WITH_XLEN as usize) {
        Some(head) if head[2] == METHOD_DEFLATE && head[3] & FLAG_EXTRA != 0 => {
            u16::from_le_bytes([head[10], head[11]]) as usize
        }
        _ => return false,
    };
    let Some(extra) = stream.peek_at(HEADER_WITH_XLEN, xlen) else {
        return false;
    };

    let mut i = 0;
    while i + 4 <= extra.len() {
        let len = u16::from_le_bytes([extra[i + 2], extra[i + 3]]) as usize;
        if extra[i] == b'B' && extra[i + 1] == b'C' && len == 2 {
            return true;
        }
        i += 4 + len;
    }
    false
}

fn open(mut stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    if is_bgzf(&mut stream) {
        return super::single::open("bgzf", Codec::Gzip, stream);
    }

    let probed = Codec::Gzip.probe(&mut stream);
    if let Err(e) = stream.rewind() {
        return Err(Rejected::new(e.into(), stream));
    }
    if let Err(e) = probed {
        return Err(Rejected::new(Error::invalid("gzip", e.to_string()), stream));
    }

    Ok(Box::new(GzipArchive::new(stream.commit())))
}

/// A gzip session yielding one entry per member.
pub struct GzipArchive<'a> {
    source: Option<BufReader<Replay<'a>>>,
    current: Option<GzDecoder<BufReader<Replay<'a>>>>,
    members: u64,
    eof: bool,
}

impl<'a> GzipArchive<'a> {
    fn new(replay: Replay<'a>) -> Self {
        Self {
            source: Some(BufReader::new(replay)),
            current: None,
            members: 0,
            eof: false,
        }
    }

    /// Drains the current member and returns the stream positioned after it.
    fn finish_member(&mut self) -> io::Result<()> {
        if let Some(mut decoder) = self.current.take() {
            io::copy(&mut decoder, &mut io::sink())?;
            self.source = Some(decoder.into_inner());
        }
        Ok(())
    }
}

impl Archive for GzipArchive<'_> {
    fn format(&self) -> &'static str {
        "gzip"
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        if self.eof {
            return Ok(None);
        }
        if let Err(e) = self.finish_member() {
            self.eof = true;
            return Err(Error::invalid("gzip", format!("member {}: {e}", self.members)));
        }

        let Some(mut source) = self.source.take() else {
            self.eof = true;
            return Ok(None);
        };
        let next = source.fill_buf()?;
        if next.is_empty() {
            self.eof = true;
            return Ok(None);
        }
        // A refill boundary can leave a single byte visible.
        let is_member = match next.len() {
            1 => next[0] == MAGIC[0],
            _ => next.starts_with(MAGIC),
        };
        if !is_member {
            log::debug!(
                "ignoring {} trailing bytes after gzip member {}",
                next.len(),
                self.members
            );
            self.eof = true;
            return Ok(None);
        }

        self.members += 1;
        let name = format!("pt_{}", self.members);
        let decoder = self.current.insert(GzDecoder::new(source));
        Ok(Some(Entry::new("", name, decoder)))
    }

    fn close(&mut self) {
        self.current = None;
        self.source = None;
    }
}
