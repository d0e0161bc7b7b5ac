//! Stream codecs.
//!
//! Single-stream formats and the packages that declare their payload
//! compression (debian members, rpm payloads) share this table of
//! decompressors. Each [`Codec`] turns a compressed reader into a boxed
//! decompressed reader.

use std::io::{self, Read};

use crate::peek::PeekReader;

/// Size of the `.lzma` ("LZMA alone") header: properties, dictionary size
/// and uncompressed size.
const LZMA_ALONE_HEADER_LEN: usize = 13;

/// A stream compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// No compression.
    Identity,
    /// gzip (RFC 1952), every member decoded.
    Gzip,
    /// bzip2, every stream decoded.
    Bzip2,
    /// xz container, every stream decoded.
    Xz,
    /// Raw LZMA with the 13-byte `.lzma` header.
    Lzma,
    /// Zstandard, every frame decoded.
    Zstd,
}

impl Codec {
    /// Returns the conventional name of this codec.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Identity => "identity",
            Codec::Gzip => "gzip",
            Codec::Bzip2 => "bzip2",
            Codec::Xz => "xz",
            Codec::Lzma => "lzma",
            Codec::Zstd => "zstd",
        }
    }

    /// Maps a file extension (without the dot) to a codec.
    ///
    /// `tar` maps to [`Codec::Identity`] so that `data.tar` and `data.tar.gz`
    /// resolve the same way.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "tar" => Some(Codec::Identity),
            "gz" | "tgz" => Some(Codec::Gzip),
            "bz2" => Some(Codec::Bzip2),
            "xz" => Some(Codec::Xz),
            "lzma" => Some(Codec::Lzma),
            "zst" | "zstd" => Some(Codec::Zstd),
            _ => None,
        }
    }

    /// Maps an rpm `PAYLOADCOMPRESSOR` tag value to a codec.
    pub fn from_rpm_compressor(name: &str) -> Option<Self> {
        match name {
            "gzip" => Some(Codec::Gzip),
            "bzip2" => Some(Codec::Bzip2),
            "xz" => Some(Codec::Xz),
            "lzma" => Some(Codec::Lzma),
            "zstd" => Some(Codec::Zstd),
            "identity" | "none" => Some(Codec::Identity),
            _ => None,
        }
    }

    /// Wraps `reader` in the matching decompressor.
    ///
    /// # Errors
    ///
    /// Fails if the decompressor needs to read a header up front and that
    /// header is missing or invalid.
    pub fn decoder<'r, R: Read + 'r>(self, reader: R) -> io::Result<Box<dyn Read + 'r>> {
        Ok(match self {
            Codec::Identity => Box::new(reader),
            Codec::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Codec::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Codec::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            Codec::Lzma => Box::new(lzma_alone(reader)?),
            Codec::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }

    /// Checks that `stream` decodes by pulling at most one output byte.
    ///
    /// An empty but well-formed stream passes. The stream position is left
    /// wherever the decoder stopped; callers rewind.
    pub(crate) fn probe(self, stream: &mut PeekReader<'_>) -> io::Result<()> {
        let mut decoder = self.decoder(&mut *stream)?;
        let mut byte = [0u8; 1];
        loop {
            match decoder.read(&mut byte) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opens a `.lzma` stream: reads its header, then decodes the rest.
fn lzma_alone<R: Read>(mut reader: R) -> io::Result<lzma_rust2::LzmaReader<R>> {
    let mut header = [0u8; LZMA_ALONE_HEADER_LEN];
    reader.read_exact(&mut header)?;
    let props = header[0];
    let dict_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    let mut size = [0u8; 8];
    size.copy_from_slice(&header[5..13]);
    // u64::MAX marks an unknown size terminated by an end marker.
    let unpacked_size = u64::from_le_bytes(size);

    lzma_rust2::LzmaReader::new_with_props(reader, unpacked_size, props, dict_size, None)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}
