//! # exploder
//!
//! Recursive archive explosion: unpack every layer of nested archives and
//! compressed streams into a directory tree, falling back to writing the
//! bytes unchanged whenever a layer cannot be unpacked safely.
//!
//! Each input is identified by signature against a catalog of formats. A
//! stream that matches exactly one format is opened and each of its entries
//! is exploded one layer deeper; a `.tar.gz` becomes a directory holding a
//! directory holding the tar members. Streams that match nothing, match
//! several formats, or turn out to be corrupt are written verbatim.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use exploder::{explode, Result};
//!
//! fn main() -> Result<()> {
//!     let file = File::open("upload.tgz")?;
//!     let size = file.metadata()?.len();
//!
//!     // Writes ./out/upload.tgz/pt_1/<tar members>
//!     let report = explode("out/upload.tgz", file, Some(size), None)?;
//!     println!("{} files, {} archives", report.files_written, report.archives());
//!     Ok(())
//! }
//! ```
//!
//! ## Output Layout
//!
//! The destination path given for the input names the input itself. Every
//! unpacked layer becomes a directory at that path, holding its entries:
//!
//! | Input | Output |
//! |-------|--------|
//! | `notes.txt` (no format) | `dest` |
//! | gzip holding text | `dest/pt_1` |
//! | `.tar.gz` with `a.txt` | `dest/pt_1/a.txt` |
//! | `.deb` | `dest/data.tar.xz/usr/...` |
//! | zip with `docs/readme` | `dest/docs/readme` |
//!
//! Single-stream compressors (gzip, bzip2, xz, zstd, lzma) name their
//! content `pt_1`, `pt_2`, ... in stream order.
//!
//! ## Formats
//!
//! zip, tar, gzip (and BGZF), bzip2, xz, zstd, lzma, 7z, cab, Debian
//! packages, rpm packages and ISO 9660 images, plus rar with the `rar`
//! feature. See [`formats`].
//!
//! ## Configuration
//!
//! ```rust
//! use exploder::{ExplodeOptions, Exploder, MemorySink, ResourceLimits};
//!
//! let options = ExplodeOptions::new()
//!     .max_depth(Some(4))
//!     .limits(ResourceLimits::strict());
//! let mut exploder = Exploder::with_sink(options, MemorySink::new());
//! let report = exploder.explode("out", &b"plain text"[..], None).unwrap();
//! assert_eq!(report.files_written, 1);
//! assert_eq!(exploder.sink().get("out"), Some(&b"plain text"[..]));
//! ```
//!
//! ## Error Handling
//!
//! Unpacking is best effort. Decoder failures are logged through the `log`
//! facade and the affected bytes are written as they are; the job goes on.
//! Only a failing sink or an exceeded [`ResourceLimits`] ceiling returns
//! `Err`:
//!
//! ```rust,no_run
//! use exploder::{explode, Error};
//!
//! match explode("out/blob", std::io::stdin(), None, Some(8)) {
//!     Ok(report) if report.errors > 0 => eprintln!("partially unpacked"),
//!     Ok(_) => {}
//!     Err(Error::Sink { path, source }) => eprintln!("cannot write {}: {source}", path.display()),
//!     Err(e) => eprintln!("aborted: {e}"),
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `sevenz` | Yes | 7z archives |
//! | `cab` | Yes | Microsoft cabinet files |
//! | `rar` | No | RAR archives (builds the native unrar library) |
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod archive;
pub mod bounded;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod explode;
pub mod formats;
pub mod options;
pub mod path;
pub mod peek;
pub mod safety;
pub mod sink;

pub use archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
pub use catalog::{Catalog, FormatDescriptor, Identification};
pub use codec::Codec;
pub use error::{Error, Result};
pub use explode::{ExplodeReport, Exploder, explode};
pub use options::ExplodeOptions;
pub use path::entry_path;
pub use peek::{PeekReader, Replay};
pub use safety::{BudgetReader, ResourceLimits};
pub use sink::{FilesystemSink, MemorySink, Sink};
