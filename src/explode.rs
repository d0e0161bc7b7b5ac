//! The explosion orchestrator.
//!
//! A job walks its input depth first. Each stream is identified against the
//! catalog; a unique match is opened and every entry is exploded one layer
//! deeper under `path/dir/name`. Everything else (no match, several matches,
//! a decoder that refuses the stream, an exhausted depth budget or nesting
//! ceiling) goes to the sink unchanged, so some output is always produced.
//! A stream a decoder consumed before refusing it leaves an empty file.
//!
//! Only fatal errors ([`crate::Error::is_fatal`]) end a job early. Recovered
//! problems are logged and counted in the [`ExplodeReport`].

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use crate::archive::{Archive, Rejected, SizeHint};
use crate::catalog::{Catalog, Identification};
use crate::error::Result;
use crate::options::ExplodeOptions;
use crate::path::entry_path;
use crate::peek::PeekReader;
use crate::safety::BudgetReader;
use crate::sink::{FilesystemSink, Sink};

/// Summary of a finished job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplodeReport {
    /// Files handed to the sink, including partial ones.
    pub files_written: u64,
    /// Bytes handed to the sink.
    pub bytes_written: u64,
    /// Archives opened, by catalog name.
    pub archives_opened: BTreeMap<&'static str, u64>,
    /// Streams written verbatim although a signature matched: ambiguous
    /// matches and decoders that refused the stream.
    pub fallbacks: u64,
    /// Streams that matched more than one signature.
    pub ambiguous: u64,
    /// Recovered errors.
    pub errors: u64,
    /// Archive entries visited.
    pub entries: u64,
    /// `true` if iteration stopped at the entry limit or a stream was left
    /// unopened at the nesting limit.
    pub truncated: bool,
}

impl ExplodeReport {
    /// Total number of archives opened.
    pub fn archives(&self) -> u64 {
        self.archives_opened.values().sum()
    }
}

/// Explodes archives into a [`Sink`].
///
/// # Example
///
/// ```rust
/// use std::io::Write;
/// use exploder::{ExplodeOptions, Exploder, MemorySink};
///
/// let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
/// gz.write_all(b"hello").unwrap();
/// let data = gz.finish().unwrap();
///
/// let mut exploder = Exploder::with_sink(ExplodeOptions::new(), MemorySink::new());
/// let report = exploder.explode("out/hello.gz", &data[..], Some(data.len() as u64)).unwrap();
/// assert_eq!(report.files_written, 1);
/// assert_eq!(exploder.sink().get("out/hello.gz/pt_1"), Some(&b"hello"[..]));
/// ```
#[derive(Debug)]
pub struct Exploder<S = FilesystemSink> {
    catalog: Catalog,
    options: ExplodeOptions,
    sink: S,
}

impl Exploder<FilesystemSink> {
    /// Creates an exploder writing to the filesystem with the builtin catalog.
    pub fn new(options: ExplodeOptions) -> Self {
        Self::with_sink(options, FilesystemSink)
    }
}

impl<S: Sink> Exploder<S> {
    /// Creates an exploder writing to `sink` with the builtin catalog.
    pub fn with_sink(options: ExplodeOptions, sink: S) -> Self {
        Self {
            catalog: Catalog::builtin(),
            options,
            sink,
        }
    }

    /// Replaces the catalog.
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Returns the catalog in use.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the options in use.
    pub fn options(&self) -> &ExplodeOptions {
        &self.options
    }

    /// Returns the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the sink mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the exploder, returning its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Explodes `reader` to `path`.
    ///
    /// `path` is where the input itself would be written; the layers
    /// unpacked from it become directories below it. `size` is the
    /// input's length if known.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: [`crate::Error::Sink`] and
    /// [`crate::Error::ResourceLimitExceeded`]. Output already written stays.
    pub fn explode(
        &mut self,
        path: impl AsRef<Path>,
        mut reader: impl Read,
        size: Option<u64>,
    ) -> Result<ExplodeReport> {
        let path = path.as_ref();
        let mut job = Job {
            catalog: &self.catalog,
            options: &self.options,
            sink: &mut self.sink,
            total: Arc::new(AtomicU64::new(0)),
            nesting: 0,
            report: ExplodeReport::default(),
        };
        job.explode(path, &mut reader, size, self.options.max_depth)?;
        let report = job.report;
        log::info!(
            "exploded {}: {} files, {} bytes, {} archives, {} fallbacks, {} errors",
            path.display(),
            report.files_written,
            report.bytes_written,
            report.archives(),
            report.fallbacks,
            report.errors
        );
        Ok(report)
    }
}

/// Explodes `reader` into the filesystem at `dest`.
///
/// `max_depth` bounds how many archive layers are opened; `None` opens them
/// all.
///
/// # Errors
///
/// See [`Exploder::explode`].
pub fn explode(
    dest: impl AsRef<Path>,
    reader: impl Read,
    size: Option<u64>,
    max_depth: Option<u32>,
) -> Result<ExplodeReport> {
    Exploder::new(ExplodeOptions::new().max_depth(max_depth)).explode(dest, reader, size)
}

/// State of one running job.
struct Job<'x> {
    catalog: &'x Catalog,
    options: &'x ExplodeOptions,
    sink: &'x mut dyn Sink,
    total: Arc<AtomicU64>,
    /// Archives currently open along the path being exploded.
    nesting: u32,
    report: ExplodeReport,
}

impl Job<'_> {
    fn explode(
        &mut self,
        path: &Path,
        reader: &mut dyn Read,
        size: Option<u64>,
        depth: Option<u32>,
    ) -> Result<()> {
        if depth == Some(0) {
            log::debug!("depth exhausted at {}", path.display());
            return self.write(path, reader, size);
        }
        if let Some(max) = self.options.limits.max_nesting.filter(|&max| self.nesting >= max) {
            log::warn!("nesting limit {max} reached at {}", path.display());
            self.report.truncated = true;
            return self.write(path, reader, size);
        }

        let mut stream = PeekReader::new(reader).buffer_limit(self.options.limits.max_peek_buffer);
        let descriptor = match self.catalog.identify(&mut stream) {
            Identification::Unique(descriptor) => *descriptor,
            Identification::NoMatch => {
                log::debug!("no format matches {}", path.display());
                return self.write(path, &mut stream.commit(), size);
            }
            Identification::Ambiguous(matches) => {
                let names: Vec<_> = matches.into_iter().map(|d| d.name).collect();
                log::debug!("{} matches several formats: {}", path.display(), names.join(", "));
                self.report.ambiguous += 1;
                self.report.fallbacks += 1;
                return self.write(path, &mut stream.commit(), size);
            }
        };

        log::debug!("{} identified as {}", path.display(), descriptor.name);
        let hint = SizeHint::new(size, self.options.unknown_size_estimate);
        let mut archive = match (descriptor.open)(stream, hint) {
            Ok(archive) => archive,
            Err(Rejected { error, stream }) => {
                log::warn!(
                    "{} looked like {} but could not be opened: {error}",
                    path.display(),
                    descriptor.name
                );
                self.report.fallbacks += 1;
                self.report.errors += 1;
                return match stream {
                    Some(mut stream) => {
                        stream.seek(SeekFrom::Start(0))?;
                        self.write(path, &mut stream.commit(), size)
                    }
                    None => {
                        log::warn!(
                            "{} was consumed and cannot be replayed, writing an empty file",
                            path.display()
                        );
                        self.write(path, &mut std::io::empty(), None)
                    }
                };
            }
        };

        *self.report.archives_opened.entry(archive.format()).or_default() += 1;
        self.nesting += 1;
        let result = self.explode_entries(path, archive.as_mut(), depth.map(|d| d - 1));
        self.nesting -= 1;
        archive.close();
        result
    }

    fn explode_entries(
        &mut self,
        path: &Path,
        archive: &mut dyn Archive,
        depth: Option<u32>,
    ) -> Result<()> {
        let format = archive.format();
        let mut ordinal = 0;
        while !archive.is_eof() {
            if self.entry_limit_reached() {
                log::warn!("entry limit reached, stopping {format} iteration of {}", path.display());
                self.report.truncated = true;
                break;
            }
            let mut entry = match archive.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("{format} iteration of {} stopped: {e}", path.display());
                    self.report.errors += 1;
                    break;
                }
            };
            ordinal += 1;
            self.report.entries += 1;
            let child = entry_path(path, entry.dir(), entry.name(), ordinal);
            let size = entry.size();
            self.explode(&child, &mut entry, size, depth)?;
        }
        Ok(())
    }

    fn entry_limit_reached(&self) -> bool {
        self.options
            .limits
            .max_entries
            .is_some_and(|max| self.report.entries >= max)
    }

    /// Hands `reader` to the sink, charging the job's output budget.
    fn write(&mut self, path: &Path, reader: &mut dyn Read, size: Option<u64>) -> Result<()> {
        let mut reader = BudgetReader::new(
            reader,
            Arc::clone(&self.total),
            self.options.limits.max_total_bytes,
        );
        match self.sink.write(path, &mut reader) {
            Ok(written) => {
                self.report.files_written += 1;
                self.report.bytes_written += written;
                if let Some(expected) = size.filter(|&expected| expected != written) {
                    log::warn!(
                        "{}: wrote {written} bytes, expected {expected}",
                        path.display()
                    );
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::warn!("{e}");
                self.report.files_written += 1;
                self.report.errors += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::sink::MemorySink;
    use std::io::{self, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn run(options: ExplodeOptions, data: &[u8]) -> (ExplodeReport, MemorySink) {
        let mut exploder = Exploder::with_sink(options, MemorySink::new());
        let report = exploder.explode("out", data, Some(data.len() as u64)).unwrap();
        (report, exploder.into_sink())
    }

    #[test]
    fn test_plain_bytes_written_verbatim() {
        let (report, sink) = run(ExplodeOptions::new(), b"just some text");
        assert_eq!(sink.get("out"), Some(&b"just some text"[..]));
        assert_eq!(report.files_written, 1);
        assert_eq!(report.archives(), 0);
    }

    #[test]
    fn test_depth_zero_writes_input() {
        let data = gzip(b"payload");
        let (report, sink) = run(ExplodeOptions::new().max_depth(Some(0)), &data);
        assert_eq!(sink.get("out"), Some(&data[..]));
        assert_eq!(report.archives(), 0);
    }

    #[test]
    fn test_nested_gzip_layers() {
        let data = gzip(&gzip(b"core"));
        let (report, sink) = run(ExplodeOptions::new(), &data);
        assert_eq!(sink.get("out/pt_1/pt_1"), Some(&b"core"[..]));
        assert_eq!(report.archives_opened.get("gzip"), Some(&2));
    }

    #[test]
    fn test_corrupt_gzip_falls_back() {
        let mut data = gzip(b"some content");
        data.truncate(10);
        data.extend_from_slice(&[0xFF; 8]);
        let (report, sink) = run(ExplodeOptions::new(), &data);
        assert_eq!(sink.get("out"), Some(&data[..]));
        assert_eq!(report.fallbacks, 1);
    }

    #[test]
    fn test_total_bytes_limit_is_fatal() {
        let options = ExplodeOptions::new()
            .limits(crate::ResourceLimits::new().max_total_bytes(Some(4)));
        let mut exploder = Exploder::with_sink(options, MemorySink::new());
        let err = exploder.explode("out", &b"more than four"[..], None).unwrap_err();
        assert!(matches!(err, Error::ResourceLimitExceeded(_)));
    }

    #[test]
    fn test_nesting_limit_writes_innermost_verbatim() {
        let mut layers = vec![b"core".to_vec()];
        for _ in 0..3000 {
            let next = gzip(layers.last().unwrap());
            layers.push(next);
        }
        let data = layers.last().unwrap();
        let options = ExplodeOptions::new().limits(crate::ResourceLimits::strict());
        let (report, sink) = run(options, data);

        let path = format!("out{}", "/pt_1".repeat(64));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get(&path), Some(&layers[3000 - 64][..]));
        assert_eq!(report.archives_opened.get("gzip"), Some(&64));
        assert!(report.truncated);
    }

    #[test]
    fn test_consumed_stream_leaves_empty_file() {
        fn test(stream: &mut PeekReader<'_>) -> bool {
            stream.matches_at(0, b"GREEDY")
        }
        fn open(mut stream: PeekReader<'_>, _size: SizeHint) -> crate::archive::OpenResult<'_> {
            let _ = io::copy(&mut stream, &mut io::sink());
            Err(Rejected::consumed(Error::invalid("greedy", "refused after reading")))
        }
        let greedy = crate::catalog::FormatDescriptor {
            name: "greedy",
            test,
            open,
        };

        let mut exploder = Exploder::with_sink(ExplodeOptions::new(), MemorySink::new())
            .with_catalog(Catalog::new([greedy]));
        let report = exploder.explode("out", &b"GREEDY payload"[..], None).unwrap();
        assert_eq!(exploder.sink().get("out"), Some(&b""[..]));
        assert_eq!(report.files_written, 1);
        assert_eq!(report.fallbacks, 1);
        assert_eq!(report.errors, 1);
    }

    #[test]
    fn test_read_error_is_recovered() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::TimedOut, "deadline"))
            }
        }
        let mut exploder = Exploder::with_sink(ExplodeOptions::new(), MemorySink::new());
        let report = exploder.explode("out", Failing, None).unwrap();
        assert_eq!(report.errors, 1);
    }
}
