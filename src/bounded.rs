//! Bounded views over shared streams.
//!
//! - [`SizedView`] gives random-access decoders a seekable stream with a
//!   fixed length, so "seek from end" means the archive's declared end.
//! - [`Payload`] is a forward-only window of a known byte count over a
//!   sequential container's stream; the remaining count is shared with the
//!   container so it can skip whatever the consumer left unread.
//! - [`Exact`] is the owning form of the same window, for entry readers
//!   handed out by a decoder library.

use std::io::{self, Read, Seek, SeekFrom};

/// A seekable view of the first `len` bytes of a stream.
pub struct SizedView<S> {
    inner: S,
    len: u64,
    pos: u64,
}

impl<S: Read + Seek> SizedView<S> {
    /// Creates a view of `inner` from offset 0 to `len`.
    pub fn new(inner: S, len: u64) -> Self {
        Self { inner, len, pos: 0 }
    }

    /// Returns the length of the view.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<S: Read + Seek> Read for SizedView<S> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || out.is_empty() {
            return Ok(0);
        }
        let max = out.len().min((self.len - self.pos) as usize);
        self.inner.seek(SeekFrom::Start(self.pos))?;
        let n = self.inner.read(&mut out[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: Read + Seek> Seek for SizedView<S> {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let pos = match target {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        self.pos = pos.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of view")
        })?;
        Ok(self.pos)
    }
}

impl<S> std::fmt::Debug for SizedView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizedView")
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

/// Forward-only window of `remaining` bytes over a container stream.
///
/// Reaching the end of the underlying stream before the window is exhausted
/// is reported as [`io::ErrorKind::UnexpectedEof`].
pub struct Payload<'r, R: ?Sized> {
    inner: &'r mut R,
    remaining: &'r mut u64,
}

impl<'r, R: Read + ?Sized> Payload<'r, R> {
    /// Creates a window that consumes at most `*remaining` bytes.
    pub fn new(inner: &'r mut R, remaining: &'r mut u64) -> Self {
        Self { inner, remaining }
    }
}

impl<R: Read + ?Sized> Read for Payload<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        read_window(&mut *self.inner, &mut *self.remaining, out)
    }
}

/// Owning window of exactly `remaining` bytes over `inner`.
///
/// Like [`Payload`], an early end of `inner` is reported as
/// [`io::ErrorKind::UnexpectedEof`] instead of a short read.
pub struct Exact<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Exact<R> {
    /// Creates a window that expects exactly `len` bytes from `inner`.
    pub fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<R: Read> Read for Exact<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        read_window(&mut self.inner, &mut self.remaining, out)
    }
}

fn read_window<R: Read + ?Sized>(
    inner: &mut R,
    remaining: &mut u64,
    out: &mut [u8],
) -> io::Result<usize> {
    if *remaining == 0 || out.is_empty() {
        return Ok(0);
    }
    let max = out.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
    let n = inner.read(&mut out[..max])?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("entry truncated with {remaining} bytes missing"),
        ));
    }
    *remaining -= n as u64;
    Ok(n)
}

/// Discards exactly `count` bytes from `reader`.
pub(crate) fn skip<R: Read + ?Sized>(reader: &mut R, count: u64) -> io::Result<()> {
    if count == 0 {
        return Ok(());
    }
    let skipped = io::copy(&mut (&mut *reader).take(count), &mut io::sink())?;
    if skipped < count {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ended {} bytes early", count - skipped),
        ));
    }
    Ok(())
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
