//! The format catalog and signature matching.
//!
//! A [`Catalog`] is an immutable list of [`FormatDescriptor`]s. Matching runs
//! every descriptor's signature test against the same [`PeekReader`], in
//! catalog order, and reports all hits; the caller decides what a hit count
//! other than one means.

use std::io::Seek;

use crate::archive::{OpenResult, SizeHint};
use crate::peek::PeekReader;

/// Signature test: returns `true` if the stream looks like this format.
///
/// Tests may read and seek freely; the catalog rewinds afterwards. They must
/// return `false`, never fail, on streams shorter than their probe.
pub type SignatureTest = fn(&mut PeekReader<'_>) -> bool;

/// Decoder constructor.
pub type Opener = for<'a> fn(PeekReader<'a>, SizeHint) -> OpenResult<'a>;

/// One registered format.
#[derive(Clone, Copy)]
pub struct FormatDescriptor {
    /// Catalog name, e.g. `"zip"`.
    pub name: &'static str,
    /// Signature test.
    pub test: SignatureTest,
    /// Decoder constructor, invoked only for a unique match.
    pub open: Opener,
}

impl std::fmt::Debug for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Result of testing a stream against a catalog.
#[derive(Debug)]
pub enum Identification<'c> {
    /// No signature matched.
    NoMatch,
    /// Exactly one signature matched.
    Unique(&'c FormatDescriptor),
    /// Several signatures matched; the stream is treated as opaque.
    Ambiguous(Vec<&'c FormatDescriptor>),
}

/// An immutable registry of formats.
#[derive(Debug, Clone)]
pub struct Catalog {
    formats: Vec<FormatDescriptor>,
}

impl Catalog {
    /// Creates a catalog from an arbitrary set of descriptors.
    pub fn new(formats: impl IntoIterator<Item = FormatDescriptor>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
        }
    }

    /// Creates the catalog of every format compiled into this crate.
    pub fn builtin() -> Self {
        Self::new(crate::formats::builtin())
    }

    /// Returns the registered descriptors in catalog order.
    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    /// Looks up a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|format| format.name == name)
    }

    /// Tests `stream` against every descriptor and rewinds it to offset 0.
    pub fn identify(&self, stream: &mut PeekReader<'_>) -> Identification<'_> {
        let mut matches = Vec::new();
        for format in &self.formats {
            let hit = (format.test)(stream);
            if stream.rewind().is_err() {
                log::debug!("rewind after {} probe failed", format.name);
            }
            if hit {
                matches.push(format);
            }
        }

        match matches.len() {
            0 => Identification::NoMatch,
            1 => Identification::Unique(matches[0]),
            _ => Identification::Ambiguous(matches),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
