//! Shared test utilities for integration tests.
//!
//! Fixture builders for every format the integration tests explode, plus a
//! helper that runs a job into a [`MemorySink`].
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use exploder::{ExplodeOptions, ExplodeReport, Exploder, MemorySink};

/// Root path every in-memory job writes under.
pub const ROOT: &str = "out";

/// Explodes `data` into memory and returns the report and written files.
///
/// The declared size is the length of `data`.
pub fn explode_to_memory(
    data: &[u8],
    options: ExplodeOptions,
) -> (ExplodeReport, BTreeMap<PathBuf, Vec<u8>>) {
    let mut exploder = Exploder::with_sink(options, MemorySink::new());
    let report = exploder
        .explode(ROOT, data, Some(data.len() as u64))
        .expect("job failed");
    (report, exploder.into_sink().into_inner())
}

/// Returns the written files as (`/`-joined path, content) pairs.
pub fn flatten(files: &BTreeMap<PathBuf, Vec<u8>>) -> Vec<(String, Vec<u8>)> {
    files
        .iter()
        .map(|(path, data)| {
            let parts: Vec<_> = path.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            (parts.join("/"), data.clone())
        })
        .collect()
}

/// Creates a GNU tar archive of regular files.
pub fn tar_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Recomputes the checksum of a tar header block after it was patched.
pub fn fix_tar_checksum(header: &mut [u8]) {
    header[148..156].fill(b' ');
    let sum: u32 = header.iter().map(|&b| u32::from(b)).sum();
    header[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
}

/// Creates a deflated zip archive.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Compresses `data` as one gzip member.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses each part as its own gzip member and concatenates them.
pub fn gzip_members(parts: &[&[u8]]) -> Vec<u8> {
    parts.iter().flat_map(|part| gzip(part)).collect()
}

/// Compresses `data` as a bzip2 stream.
pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses `data` as an xz stream.
pub fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Compresses `data` as a zstd frame.
pub fn zstd(data: &[u8]) -> Vec<u8> {
    zstd::encode_all(data, 3).unwrap()
}

/// Compresses `data` in the `.lzma` container (preset 6, 8 MiB dictionary).
pub fn lzma(data: &[u8]) -> Vec<u8> {
    let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
    let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Creates an `ar` archive, the container of Debian packages.
pub fn ar_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = b"!<arch>\n".to_vec();
    for (name, data) in members {
        let header = format!(
            "{:<16}{:<12}{:<6}{:<6}{:<8}{:<10}`\n",
            name,
            0,
            0,
            0,
            100644,
            data.len()
        );
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(b'\n');
        }
    }
    out
}

/// Creates a Debian package with the given control and data tarballs.
pub fn deb_package(control: (&str, &[u8]), data: (&str, &[u8])) -> Vec<u8> {
    ar_archive(&[("debian-binary", &b"2.0\n"[..]), control, data])
}

fn pad4(out: &mut Vec<u8>) {
    out.resize(out.len().next_multiple_of(4), 0);
}

/// Creates a newc cpio archive of regular files.
pub fn cpio_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let record = |out: &mut Vec<u8>, name: &str, mode: u32, data: &[u8]| {
        let fields = [
            0,
            mode,
            0,
            0,
            1,
            0,
            data.len() as u32,
            0,
            0,
            0,
            0,
            name.len() as u32 + 1,
            0,
        ];
        out.extend_from_slice(b"070701");
        for field in fields {
            out.extend_from_slice(format!("{field:08X}").as_bytes());
        }
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        pad4(out);
        out.extend_from_slice(data);
        pad4(out);
    };
    for (name, data) in entries {
        record(&mut out, *name, 0o100644, *data);
    }
    record(&mut out, "TRAILER!!!", 0, &[]);
    out
}

/// Creates an rpm whose payload is `payload`, declared as cpio compressed
/// with `compressor`.
pub fn rpm_package(compressor: &str, payload: &[u8]) -> Vec<u8> {
    fn intro(out: &mut Vec<u8>, entries: u32, data_len: u32) {
        out.extend_from_slice(&[0x8E, 0xAD, 0xE8, 0x01, 0, 0, 0, 0]);
        out.extend_from_slice(&entries.to_be_bytes());
        out.extend_from_slice(&data_len.to_be_bytes());
    }

    let mut out = vec![0xED, 0xAB, 0xEE, 0xDB];
    out.resize(96, 0);
    intro(&mut out, 0, 0);

    let store = format!("cpio\0{compressor}\0").into_bytes();
    let mut index = Vec::new();
    for (tag, offset) in [(1124u32, 0u32), (1125, 5)] {
        index.extend_from_slice(&tag.to_be_bytes());
        index.extend_from_slice(&6u32.to_be_bytes());
        index.extend_from_slice(&offset.to_be_bytes());
        index.extend_from_slice(&1u32.to_be_bytes());
    }
    intro(&mut out, 2, store.len() as u32);
    out.extend(index);
    out.extend(store);
    out.extend_from_slice(payload);
    out
}

/// Creates an ISO 9660 image with the given files in its root directory.
///
/// Each file starts on its own 2048-byte block, in the given order.
pub fn iso_image(files: &[(&str, &[u8])]) -> Vec<u8> {
    const BLOCK: usize = 2048;
    const ROOT_EXTENT: u32 = 18;

    fn record(name: &[u8], extent: u32, len: u32, dir: bool) -> Vec<u8> {
        let total = 33 + name.len() + (name.len() + 1) % 2;
        let mut raw = vec![0u8; total];
        raw[0] = total as u8;
        raw[2..6].copy_from_slice(&extent.to_le_bytes());
        raw[10..14].copy_from_slice(&len.to_le_bytes());
        raw[25] = if dir { 0x02 } else { 0 };
        raw[32] = name.len() as u8;
        raw[33..33 + name.len()].copy_from_slice(name);
        raw
    }

    let mut image = vec![0u8; 16 * BLOCK];
    let mut pvd = vec![0u8; BLOCK];
    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[128..130].copy_from_slice(&(BLOCK as u16).to_le_bytes());
    let root = record(&[0], ROOT_EXTENT, BLOCK as u32, true);
    pvd[156..156 + root.len()].copy_from_slice(&root);
    image.extend(pvd);
    let mut terminator = vec![0u8; BLOCK];
    terminator[0] = 255;
    terminator[1..6].copy_from_slice(b"CD001");
    image.extend(terminator);

    let mut dir = record(&[0], ROOT_EXTENT, BLOCK as u32, true);
    dir.extend(record(&[1], ROOT_EXTENT, BLOCK as u32, true));
    let mut extent = ROOT_EXTENT + 1;
    let mut placed = Vec::new();
    for (name, data) in files {
        let id = format!("{name};1");
        dir.extend(record(id.as_bytes(), extent, data.len() as u32, false));
        placed.push((extent, *data));
        extent += data.len().div_ceil(BLOCK).max(1) as u32;
    }
    dir.resize(BLOCK, 0);
    image.extend(dir);

    for (extent, data) in placed {
        image.resize(extent as usize * BLOCK, 0);
        image.extend_from_slice(data);
    }
    image.resize(image.len().next_multiple_of(BLOCK), 0);
    image
}
