//! ISO 9660 images.
//!
//! The directory tree is walked up front through the peek buffer, which
//! yields a flat list of files. The list is sorted by data offset so the
//! image can then be read front to back; a file whose extent starts before
//! the end of the previously yielded file is skipped, which covers aliased
//! and overlapping directory records.

use std::collections::HashSet;
use std::io::Read;

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::bounded::{Payload, skip};
use crate::catalog::FormatDescriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Standard identifier of every volume descriptor.
pub const MAGIC: &[u8] = b"CD001";
/// Offset of the first descriptor's standard identifier.
pub const MAGIC_OFFSET: u64 = 32769;

const SECTOR_LEN: u64 = 2048;
const FIRST_DESCRIPTOR: u64 = 16;
const MAX_DESCRIPTORS: u64 = 64;
const TYPE_PRIMARY: u8 = 1;
const TYPE_TERMINATOR: u8 = 255;

const BLOCK_SIZE_OFFSET: usize = 128;
const ROOT_RECORD_OFFSET: usize = 156;
const RECORD_MIN_LEN: usize = 34;
const FLAG_DIRECTORY: u8 = 0x02;

const MAX_EXTENT_LEN: u64 = 16 << 20;
const MAX_DEPTH: usize = 64;

/// Catalog entry for ISO 9660.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "iso9660",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(MAGIC_OFFSET, MAGIC)
}

/// A directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Record {
    name: String,
    extent: u64,
    len: u64,
    is_dir: bool,
}

/// A file found while walking the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IsoFile {
    dir: String,
    name: String,
    offset: u64,
    size: u64,
}

fn le16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn le32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Parses one directory record; `None` for `.` and `..`.
fn parse_record(raw: &[u8]) -> Result<Option<Record>> {
    if raw.len() < RECORD_MIN_LEN {
        return Err(Error::invalid("iso9660", "short directory record"));
    }
    let name_len = raw[32] as usize;
    let id = raw
        .get(33..33 + name_len)
        .ok_or_else(|| Error::invalid("iso9660", "directory record name overflows"))?;
    if id == [0] || id == [1] {
        return Ok(None);
    }
    Ok(Some(Record {
        name: clean_name(&String::from_utf8_lossy(id)),
        extent: u64::from(le32(&raw[2..6])),
        len: u64::from(le32(&raw[10..14])),
        is_dir: raw[25] & FLAG_DIRECTORY != 0,
    }))
}

/// Strips the `;N` version suffix and a trailing dot.
fn clean_name(id: &str) -> String {
    let base = id.split_once(';').map_or(id, |(base, _)| base);
    base.strip_suffix('.').unwrap_or(base).to_string()
}

/// Reads the records of one directory extent.
fn read_directory(stream: &mut PeekReader<'_>, block: u64, dir: &Record) -> Result<Vec<Record>> {
    if dir.len > MAX_EXTENT_LEN {
        return Err(Error::invalid(
            "iso9660",
            format!("directory '{}' extent of {} bytes", dir.name, dir.len),
        ));
    }
    let data = stream
        .peek_at(dir.extent * block, dir.len as usize)
        .ok_or_else(|| Error::invalid("iso9660", format!("directory '{}' truncated", dir.name)))?;

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        let len = data[pos] as usize;
        if len == 0 {
            // Records never span a block; padding runs to the next one.
            pos = (pos as u64 / block + 1).saturating_mul(block) as usize;
            continue;
        }
        let raw = data
            .get(pos..pos + len)
            .ok_or_else(|| Error::invalid("iso9660", "directory record overflows extent"))?;
        records.extend(parse_record(raw)?);
        pos += len;
    }
    Ok(records)
}

/// Locates the primary volume descriptor; returns the logical block size
/// and the root directory record.
fn primary_volume(stream: &mut PeekReader<'_>) -> Result<(u64, Record)> {
    for index in FIRST_DESCRIPTOR..FIRST_DESCRIPTOR + MAX_DESCRIPTORS {
        let sector = stream
            .peek_at(index * SECTOR_LEN, SECTOR_LEN as usize)
            .ok_or_else(|| Error::invalid("iso9660", "volume descriptors truncated"))?;
        if &sector[1..6] != MAGIC {
            break;
        }
        match sector[0] {
            TYPE_PRIMARY => {
                let block = u64::from(le16(&sector[BLOCK_SIZE_OFFSET..]));
                if !block.is_power_of_two() || !(512..=SECTOR_LEN).contains(&block) {
                    return Err(Error::invalid("iso9660", format!("block size {block}")));
                }
                let raw = &sector[ROOT_RECORD_OFFSET..ROOT_RECORD_OFFSET + RECORD_MIN_LEN];
                let root = Record {
                    name: String::new(),
                    extent: u64::from(le32(&raw[2..6])),
                    len: u64::from(le32(&raw[10..14])),
                    is_dir: true,
                };
                return Ok((block, root));
            }
            TYPE_TERMINATOR => break,
            _ => {}
        }
    }
    Err(Error::invalid("iso9660", "no primary volume descriptor"))
}

/// Walks the tree and returns every file sorted by data offset.
fn collect_files(stream: &mut PeekReader<'_>) -> Result<Vec<IsoFile>> {
    let (block, root) = primary_volume(stream)?;
    let mut visited = HashSet::from([root.extent]);
    let mut pending = vec![(String::new(), root, 0usize)];
    let mut files = Vec::new();

    while let Some((path, dir, depth)) = pending.pop() {
        for record in read_directory(stream, block, &dir)? {
            if !record.is_dir {
                files.push(IsoFile {
                    dir: path.clone(),
                    name: record.name,
                    offset: record.extent * block,
                    size: record.len,
                });
                continue;
            }
            if depth + 1 > MAX_DEPTH {
                return Err(Error::invalid("iso9660", "directory tree too deep"));
            }
            if !visited.insert(record.extent) {
                log::debug!("skipping revisited iso9660 directory '{}'", record.name);
                continue;
            }
            let child = if path.is_empty() {
                record.name.clone()
            } else {
                format!("{path}/{}", record.name)
            };
            pending.push((child, record, depth + 1));
        }
    }

    files.sort_by_key(|file| file.offset);
    Ok(files)
}

fn open(mut stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    match collect_files(&mut stream) {
        Ok(files) => Ok(Box::new(IsoArchive {
            reader: stream.commit(),
            files: files.into_iter(),
            pos: 0,
            remaining: 0,
        })),
        Err(e) => Err(Rejected::new(e, stream)),
    }
}

/// An ISO 9660 session.
pub struct IsoArchive<R> {
    reader: R,
    files: std::vec::IntoIter<IsoFile>,
    /// Offset of the reader once the current entry has been drained.
    pos: u64,
    remaining: u64,
}

impl<R: Read> Archive for IsoArchive<R> {
    fn format(&self) -> &'static str {
        "iso9660"
    }

    fn is_eof(&self) -> bool {
        self.files.len() == 0
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        skip(&mut self.reader, self.remaining)?;
        self.remaining = 0;

        for file in self.files.by_ref() {
            if file.offset < self.pos {
                log::debug!(
                    "skipping overlapping iso9660 entry '{}/{}' at {}",
                    file.dir,
                    file.name,
                    file.offset
                );
                continue;
            }
            skip(&mut self.reader, file.offset - self.pos)?;
            self.pos = file.offset + file.size;
            self.remaining = file.size;
            let payload = Payload::new(&mut self.reader, &mut self.remaining);
            return Ok(Some(
                Entry::new(file.dir, file.name, payload).with_size(Some(file.size)),
            ));
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.files = Vec::new().into_iter();
        self.remaining = 0;
    }
}

/// Builds a minimal image: root holding `files` plus one subdirectory
/// holding `nested`, every file starting on its own block.
#[cfg(test)]
pub(crate) fn build(files: &[(&str, &[u8])], nested: &[(&str, &[u8])]) -> Vec<u8> {
    const BLOCK: usize = SECTOR_LEN as usize;

    fn record(name: &[u8], extent: u32, len: u32, dir: bool) -> Vec<u8> {
        let total = 33 + name.len() + (name.len() + 1) % 2;
        let mut raw = vec![0u8; total];
        raw[0] = total as u8;
        raw[2..6].copy_from_slice(&extent.to_le_bytes());
        raw[6..10].copy_from_slice(&extent.to_be_bytes());
        raw[10..14].copy_from_slice(&len.to_le_bytes());
        raw[14..18].copy_from_slice(&len.to_be_bytes());
        raw[25] = if dir { FLAG_DIRECTORY } else { 0 };
        raw[32] = name.len() as u8;
        raw[33..33 + name.len()].copy_from_slice(name);
        raw
    }

    let root_extent = 18u32;
    let sub_extent = 19u32;
    let mut next_extent = 20u32;
    let mut place = |data: &[u8]| {
        let extent = next_extent;
        next_extent += (data.len().div_ceil(BLOCK)).max(1) as u32;
        extent
    };
    let root_files: Vec<_> = files.iter().map(|&(n, d)| (n, d, place(d))).collect();
    let sub_files: Vec<_> = nested.iter().map(|&(n, d)| (n, d, place(d))).collect();

    fn directory(own: u32, parent: u32, entries: &[(&str, &[u8], u32)], sub: Option<u32>) -> Vec<u8> {
        let mut out = record(&[0], own, BLOCK as u32, true);
        out.extend(record(&[1], parent, BLOCK as u32, true));
        if let Some(sub) = sub {
            out.extend(record(b"SUB", sub, BLOCK as u32, true));
        }
        for (name, data, extent) in entries {
            out.extend(record(format!("{name};1").as_bytes(), *extent, data.len() as u32, false));
        }
        out.resize(BLOCK, 0);
        out
    }

    let mut image = vec![0u8; 16 * BLOCK];
    let mut pvd = vec![0u8; BLOCK];
    pvd[0] = TYPE_PRIMARY;
    pvd[1..6].copy_from_slice(MAGIC);
    pvd[6] = 1;
    pvd[BLOCK_SIZE_OFFSET..BLOCK_SIZE_OFFSET + 2].copy_from_slice(&(BLOCK as u16).to_le_bytes());
    let root = record(&[0], root_extent, BLOCK as u32, true);
    pvd[ROOT_RECORD_OFFSET..ROOT_RECORD_OFFSET + root.len()].copy_from_slice(&root);
    image.extend(pvd);

    let mut terminator = vec![0u8; BLOCK];
    terminator[0] = TYPE_TERMINATOR;
    terminator[1..6].copy_from_slice(MAGIC);
    image.extend(terminator);

    image.extend(directory(root_extent, root_extent, &root_files, Some(sub_extent)));
    image.extend(directory(sub_extent, root_extent, &sub_files, None));
    for (_, data, extent) in root_files.iter().chain(&sub_files) {
        image.resize(*extent as usize * BLOCK, 0);
        image.extend_from_slice(data);
    }
    image.resize(image.len().next_multiple_of(BLOCK), 0);
    image
}
