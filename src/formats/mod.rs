//! Per-format decoders.
//!
//! Each submodule exports a `FORMAT` descriptor (signature test plus
//! constructor) and the [`crate::Archive`] implementation behind it. The
//! decoders fall into families:
//!
//! - single-content streams: [`gzip`], [`bzip2`], [`xz`], [`zstd`], [`lzma`]
//! - random-access containers: [`zip`], `sevenzip`, `cab`
//! - forward-only containers: [`tar`], `rar`
//! - packages that declare their own payload codec: [`debian`], [`rpm`]
//! - disk images: [`iso9660`]

use crate::catalog::FormatDescriptor;

pub mod bzip2;
#[cfg(feature = "cab")]
#[cfg_attr(docsrs, doc(cfg(feature = "cab")))]
pub mod cab;
mod cpio;
pub mod debian;
pub mod gzip;
pub mod iso9660;
pub mod lzma;
#[cfg(feature = "rar")]
#[cfg_attr(docsrs, doc(cfg(feature = "rar")))]
pub mod rar;
pub mod rpm;
#[cfg(feature = "sevenz")]
#[cfg_attr(docsrs, doc(cfg(feature = "sevenz")))]
pub mod sevenzip;
mod single;
pub mod tar;
pub mod xz;
pub mod zip;
pub mod zstd;

/// Returns the descriptors of every compiled-in format, in catalog order.
pub fn builtin() -> Vec<FormatDescriptor> {
    let mut formats = vec![
        zip::FORMAT,
        tar::FORMAT,
        gzip::FORMAT,
        bzip2::FORMAT,
        xz::FORMAT,
        zstd::FORMAT,
        lzma::FORMAT,
    ];
    #[cfg(feature = "rar")]
    formats.push(rar::FORMAT);
    #[cfg(feature = "sevenz")]
    formats.push(sevenzip::FORMAT);
    #[cfg(feature = "cab")]
    formats.push(cab::FORMAT);
    formats.extend([debian::FORMAT, rpm::FORMAT, iso9660::FORMAT]);
    formats
}
