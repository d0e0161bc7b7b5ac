//! Output sinks.
//!
//! A [`Sink`] receives every leaf of an explosion: entries that are not
//! archives, archives past the depth budget, and inputs that could not be
//! opened. The sink sees only a path and a reader.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const COPY_BUF_LEN: usize = 64 * 1024;

/// Destination for exploded content.
pub trait Sink {
    /// Copies `reader` to `path` and returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// [`Error::Read`] if `reader` fails; whatever was copied so far is
    /// kept. [`Error::Sink`] if the destination cannot be created or
    /// written.
    fn write(&mut self, path: &Path, reader: &mut dyn Read) -> Result<u64>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write(&mut self, path: &Path, reader: &mut dyn Read) -> Result<u64> {
        (**self).write(path, reader)
    }
}

fn sink_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Sink {
        path: path.to_path_buf(),
        source,
    }
}

/// Copies `reader` into `writer`, keeping read and write failures apart.
fn copy(path: &Path, reader: &mut dyn Read, writer: &mut dyn Write) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUF_LEN];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                writer.flush().map_err(sink_error(path))?;
                return Err(Error::from_read(path.to_path_buf(), e));
            }
        };
        writer.write_all(&buf[..n]).map_err(sink_error(path))?;
        total += n as u64;
    }
    writer.flush().map_err(sink_error(path))?;
    Ok(total)
}

/// Writes files to the local filesystem, creating parent directories.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemSink;

impl FilesystemSink {
    /// Creates a filesystem sink.
    pub fn new() -> Self {
        Self
    }
}

impl Sink for FilesystemSink {
    fn write(&mut self, path: &Path, reader: &mut dyn Read) -> Result<u64> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(sink_error(path))?;
        }
        let file = File::create(path).map_err(sink_error(path))?;
        log::trace!("writing {}", path.display());
        copy(path, reader, &mut BufWriter::new(file))
    }
}

/// Collects exploded files in memory, keyed by path.
///
/// Writing the same path twice keeps the last content.
///
/// ```rust
/// use std::path::Path;
/// use exploder::{MemorySink, Sink};
///
/// let mut sink = MemorySink::new();
/// sink.write(Path::new("out/a.txt"), &mut &b"alpha"[..]).unwrap();
/// assert_eq!(sink.get("out/a.txt"), Some(&b"alpha"[..]));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content written to `path`.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }

    /// Returns every written file in path order.
    pub fn files(&self) -> &BTreeMap<PathBuf, Vec<u8>> {
        &self.files
    }

    /// Returns the number of files written.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Consumes the sink, returning its files.
    pub fn into_inner(self) -> BTreeMap<PathBuf, Vec<u8>> {
        self.files
    }
}

impl Sink for MemorySink {
    fn write(&mut self, path: &Path, reader: &mut dyn Read) -> Result<u64> {
        let mut data = Vec::new();
        let copied = copy(path, reader, &mut data);
        self.files.insert(path.to_path_buf(), data);
        copied
    }
}
