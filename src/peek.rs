//! Replayable peek stream.
//!
//! Format detection has to try many signatures, some of them deep into the
//! stream, before any decoder is allowed to consume it. Sources are often
//! one-shot (a request body, a decompressor feeding a nested layer), so the
//! bytes pulled during detection are kept in a growable buffer and replayed.
//!
//! [`PeekReader`] supports `Read` and `Seek` over the buffered prefix, pulling
//! more from the source whenever a read or seek goes past it. Once a consumer
//! has been chosen, [`PeekReader::commit`] moves the buffer and the source
//! into a forward-only [`Replay`]; the buffer stops growing and no further
//! seeking is possible.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::error::Error;

/// Minimum number of bytes pulled from the source per buffer refill.
const FILL_CHUNK: u64 = 8 * 1024;

/// A reader that buffers everything it pulls from its source so the bytes
/// can be re-read from any buffered offset.
///
/// # Example
///
/// ```rust
/// use std::io::{Read, Seek};
/// use exploder::PeekReader;
///
/// let mut stream = PeekReader::new(&b"hello world"[..]);
/// assert!(stream.matches_at(6, b"world"));
///
/// let mut head = [0u8; 5];
/// stream.read_exact(&mut head).unwrap();
/// stream.rewind().unwrap();
///
/// let mut all = Vec::new();
/// stream.commit().read_to_end(&mut all).unwrap();
/// assert_eq!(all, b"hello world");
/// ```
pub struct PeekReader<'a> {
    source: Box<dyn Read + 'a>,
    buf: Vec<u8>,
    pos: u64,
    exhausted: bool,
    limit: Option<u64>,
}

impl<'a> PeekReader<'a> {
    /// Wraps a source reader. Nothing is read until the first probe.
    pub fn new<R: Read + 'a>(source: R) -> Self {
        Self {
            source: Box::new(source),
            buf: Vec::new(),
            pos: 0,
            exhausted: false,
            limit: None,
        }
    }

    /// Caps the number of bytes this stream may buffer before commit.
    ///
    /// Probes that need bytes beyond the cap behave as if the stream were
    /// too short; reads and seeks past the cap fail with
    /// [`Error::ResourceLimitExceeded`] wrapped in an `io::Error`.
    pub fn buffer_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Returns the current logical position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered_len(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Returns `true` once the source has reported end of stream.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Buffers until at least `end` bytes are held or the source ends.
    ///
    /// Returns the number of buffered bytes, which is smaller than `end`
    /// only when the source is shorter.
    ///
    /// # Errors
    ///
    /// Returns the source's read error, or a resource limit error if `end`
    /// lies beyond the configured buffer limit.
    pub fn fill_to(&mut self, end: u64) -> io::Result<u64> {
        let have = self.buffered_len();
        if end <= have || self.exhausted {
            return Ok(have);
        }

        let target = self.limit.map_or(end, |limit| end.min(limit.max(have)));
        if target > have {
            let want = target - have;
            let got = Read::take(&mut self.source, want).read_to_end(&mut self.buf)? as u64;
            if got < want {
                self.exhausted = true;
                return Ok(self.buffered_len());
            }
        }

        if target < end {
            return Err(io::Error::other(Error::ResourceLimitExceeded(format!(
                "signature buffer of {} bytes exceeds limit {}",
                end,
                self.limit.unwrap_or_default()
            ))));
        }
        Ok(self.buffered_len())
    }

    /// Returns `len` bytes at `offset` without moving the cursor.
    ///
    /// Returns `None` if the stream is shorter than `offset + len` or the
    /// source fails.
    pub fn peek_at(&mut self, offset: u64, len: usize) -> Option<&[u8]> {
        let end = offset.checked_add(len as u64)?;
        let have = self.fill_to(end).ok()?;
        if have < end {
            return None;
        }
        Some(&self.buf[offset as usize..end as usize])
    }

    /// Returns `true` if `magic` occurs exactly at `offset`.
    ///
    /// Short streams and source errors yield `false`.
    pub fn matches_at(&mut self, offset: u64, magic: &[u8]) -> bool {
        self.peek_at(offset, magic.len())
            .is_some_and(|bytes| bytes == magic)
    }

    /// Hands the stream to its single consumer.
    ///
    /// The returned reader yields the buffered bytes from the current
    /// position, then continues with the live source. The buffer is released
    /// once it has been replayed.
    pub fn commit(self) -> Replay<'a> {
        let buffered = self.buffered_len();
        let start = self.pos.min(buffered);
        let mut prefix = Cursor::new(self.buf);
        prefix.set_position(start);
        Replay {
            prefix,
            skip: self.pos - start,
            source: self.source,
        }
    }
}

impl Read for PeekReader<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let want_end = self.pos.saturating_add(out.len() as u64);
        if want_end > self.buffered_len() {
            let ahead = want_end.max(self.buffered_len() + FILL_CHUNK);
            if let Err(e) = self.fill_to(ahead) {
                if self.pos >= self.buffered_len() {
                    return Err(e);
                }
            }
        }

        let have = self.buffered_len();
        if self.pos >= have {
            return Ok(0);
        }
        let start = self.pos as usize;
        let n = out.len().min((have - self.pos) as usize);
        out[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for PeekReader<'_> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let pos = match target {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => offset_by(self.pos, delta)?,
            SeekFrom::End(delta) => {
                let len = self.fill_to(u64::MAX)?;
                offset_by(len, delta)?
            }
        };
        if pos > self.buffered_len() {
            self.fill_to(pos)?;
        }
        self.pos = pos;
        Ok(pos)
    }
}

impl std::fmt::Debug for PeekReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeekReader")
            .field("pos", &self.pos)
            .field("buffered", &self.buf.len())
            .field("exhausted", &self.exhausted)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

fn offset_by(base: u64, delta: i64) -> io::Result<u64> {
    base.checked_add_signed(delta).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative or overflowing position",
        )
    })
}

/// The committed, forward-only form of a [`PeekReader`].
///
/// Yields the replayed buffer followed by the live tail of the source.
pub struct Replay<'a> {
    prefix: Cursor<Vec<u8>>,
    skip: u64,
    source: Box<dyn Read + 'a>,
}

impl Read for Replay<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }

        let n = self.prefix.read(out)?;
        if n > 0 {
            return Ok(n);
        }
        if !self.prefix.get_ref().is_empty() {
            self.prefix = Cursor::new(Vec::new());
        }

        if self.skip > 0 {
            let want = self.skip;
            self.skip = 0;
            let skipped = io::copy(&mut Read::take(&mut self.source, want), &mut io::sink())?;
            if skipped < want {
                return Ok(0);
            }
        }

        self.source.read(out)
    }
}

impl std::fmt::Debug for Replay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.prefix.get_ref().len() as u64 - self.prefix.position();
        f.debug_struct("Replay")
            .field("pending_prefix", &pending)
            .finish_non_exhaustive()
    }
}
