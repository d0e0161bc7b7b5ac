//! The archive decoder contract.
//!
//! Every supported format is exposed through the object-safe [`Archive`]
//! trait: a forward-only, non-restartable sequence of [`Entry`] values. An
//! entry borrows its session, so the borrow checker enforces that an entry's
//! content is consumed (or dropped) before the next one is requested.
//!
//! Decoders are constructed by a [`crate::catalog::FormatDescriptor`]'s
//! `open` function from a [`PeekReader`] and a [`SizeHint`]. A decoder that
//! rejects its input returns a [`Rejected`] which gives the stream back
//! whenever it has not been consumed, so the orchestrator can still write it
//! verbatim.

use std::io::{self, Read};

use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// A decoded archive session.
pub trait Archive {
    /// Returns the format name of this session, e.g. `"gzip"` or `"bgzf"`.
    fn format(&self) -> &'static str;

    /// Returns `true` once the decoder knows no further entries exist.
    ///
    /// Some decoders only learn this when [`Archive::next_entry`] returns
    /// `Ok(None)`, so callers must handle both signals.
    fn is_eof(&self) -> bool;

    /// Advances to the next regular-file entry.
    ///
    /// Returns `Ok(None)` at the normal end of the archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is corrupt past this point. Entries
    /// already yielded stay valid, but the session cannot continue.
    fn next_entry(&mut self) -> Result<Option<Entry<'_>>>;

    /// Releases decoder resources. Called exactly once per session.
    fn close(&mut self) {}
}

/// One member of an archive: where it goes and its content.
pub struct Entry<'e> {
    dir: String,
    name: String,
    size: Option<u64>,
    reader: Box<dyn Read + 'e>,
}

impl<'e> Entry<'e> {
    /// Creates an entry from a directory and a file name.
    pub fn new(dir: impl Into<String>, name: impl Into<String>, reader: impl Read + 'e) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            size: None,
            reader: Box::new(reader),
        }
    }

    /// Creates an entry from a `/`-separated stored path.
    ///
    /// The path is split after its last separator, so `"a/b/c.txt"` becomes
    /// dir `"a/b/"` and name `"c.txt"`.
    pub fn from_path(path: &str, reader: impl Read + 'e) -> Self {
        let split = path.rfind('/').map_or(0, |i| i + 1);
        let (dir, name) = path.split_at(split);
        Self::new(dir, name, reader)
    }

    /// Sets the declared content length.
    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    /// Directory part reported by the decoder.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// File name reported by the decoder.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared content length, if the format records one.
    pub fn size(&self) -> Option<u64> {
        self.size
    }
}

impl Read for Entry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for Entry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("dir", &self.dir)
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Length information handed to a decoder constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeHint {
    /// Length declared by the caller or the enclosing archive.
    pub declared: Option<u64>,
    /// Length assumed when `declared` is missing or unreliable.
    pub estimate: u64,
}

impl SizeHint {
    /// Declared sizes below this are treated as unknown.
    pub const MIN_RELIABLE: u64 = 10;

    /// Creates a size hint.
    pub fn new(declared: Option<u64>, estimate: u64) -> Self {
        Self { declared, estimate }
    }

    /// Returns the length a random-access decoder should assume.
    ///
    /// A reliable declared size is trusted as is. Otherwise the estimate is
    /// used, clamped to the bytes the stream actually holds.
    pub fn resolve(&self, stream: &mut PeekReader<'_>) -> u64 {
        match self.declared {
            Some(len) if len >= Self::MIN_RELIABLE => len,
            _ => stream
                .fill_to(self.estimate)
                .unwrap_or_else(|_| stream.buffered_len())
                .min(self.estimate),
        }
    }
}

/// A decoder's refusal to open a stream.
pub struct Rejected<'a> {
    /// Why the decoder refused.
    pub error: Error,
    /// The untouched stream, or `None` if it was consumed while trying.
    pub stream: Option<PeekReader<'a>>,
}

impl<'a> Rejected<'a> {
    /// Rejection that returns the stream to the caller.
    pub fn new(error: Error, stream: PeekReader<'a>) -> Self {
        Self {
            error,
            stream: Some(stream),
        }
    }

    /// Rejection after the stream was consumed.
    pub fn consumed(error: Error) -> Self {
        Self {
            error,
            stream: None,
        }
    }
}

impl std::fmt::Debug for Rejected<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("stream_returned", &self.stream.is_some())
            .finish()
    }
}

/// Outcome of a decoder constructor.
pub type OpenResult<'a> = std::result::Result<Box<dyn Archive + 'a>, Rejected<'a>>;
