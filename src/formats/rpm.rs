//! rpm packages.
//!
//! An rpm is a 96-byte lead, a signature header, the main header and the
//! payload. The main header declares the payload's archive format (tag
//! 1124, `cpio` when absent) and compressor (tag 1125, `gzip` when absent);
//! the decoder applies both itself and yields the regular files of the cpio
//! payload.

use std::io::{Seek, SeekFrom};

use super::cpio::CpioArchive;
use crate::archive::{OpenResult, Rejected, SizeHint};
use crate::catalog::FormatDescriptor;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Lead magic.
pub const MAGIC: &[u8] = &[0xED, 0xAB, 0xEE, 0xDB];

const LEAD_LEN: u64 = 96;
const HEADER_MAGIC: &[u8] = &[0x8E, 0xAD, 0xE8, 0x01];
/// Magic, reserved bytes, entry count and data length.
const HEADER_INTRO_LEN: u64 = 16;
const INDEX_ENTRY_LEN: u64 = 16;
const MAX_INDEX_ENTRIES: u64 = 0xFFFF;
const MAX_DATA_LEN: u64 = 256 << 20;

const TAG_PAYLOAD_FORMAT: u32 = 1124;
const TAG_PAYLOAD_COMPRESSOR: u32 = 1125;
const TYPE_STRING: u32 = 6;

/// Catalog entry for rpm.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "rpm",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

/// Where the payload starts and how it is encoded.
#[derive(Debug, PartialEq, Eq)]
struct PayloadInfo {
    offset: u64,
    format: String,
    compressor: String,
}

fn be32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reads a header intro at `offset`; returns (entry count, data length).
fn header_intro(stream: &mut PeekReader<'_>, offset: u64) -> Result<(u64, u64)> {
    let intro = stream
        .peek_at(offset, HEADER_INTRO_LEN as usize)
        .ok_or_else(|| Error::invalid("rpm", "truncated header"))?;
    if !intro.starts_with(HEADER_MAGIC) {
        return Err(Error::invalid("rpm", format!("bad header magic at {offset}")));
    }
    let entries = u64::from(be32(&intro[8..12]));
    let data_len = u64::from(be32(&intro[12..16]));
    if entries > MAX_INDEX_ENTRIES || data_len > MAX_DATA_LEN {
        return Err(Error::invalid("rpm", "header exceeds size limits"));
    }
    Ok((entries, data_len))
}

fn payload_info(stream: &mut PeekReader<'_>) -> Result<PayloadInfo> {
    let (entries, data_len) = header_intro(stream, LEAD_LEN)?;
    let signature_end = LEAD_LEN + HEADER_INTRO_LEN + entries * INDEX_ENTRY_LEN + data_len;
    let main = signature_end.next_multiple_of(8);

    let (entries, data_len) = header_intro(stream, main)?;
    let index_len = entries * INDEX_ENTRY_LEN;
    let body = stream
        .peek_at(main + HEADER_INTRO_LEN, (index_len + data_len) as usize)
        .ok_or_else(|| Error::invalid("rpm", "truncated main header"))?;
    let (index, store) = body.split_at(index_len as usize);

    let mut format = None;
    let mut compressor = None;
    for entry in index.chunks_exact(INDEX_ENTRY_LEN as usize) {
        let tag = be32(&entry[0..4]);
        let slot = match tag {
            TAG_PAYLOAD_FORMAT => &mut format,
            TAG_PAYLOAD_COMPRESSOR => &mut compressor,
            _ => continue,
        };
        let offset = be32(&entry[8..12]) as usize;
        if be32(&entry[4..8]) != TYPE_STRING || offset >= store.len() {
            return Err(Error::invalid("rpm", format!("malformed tag {tag}")));
        }
        let value = &store[offset..];
        let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
        *slot = Some(String::from_utf8_lossy(&value[..end]).into_owned());
    }

    Ok(PayloadInfo {
        offset: main + HEADER_INTRO_LEN + index_len + data_len,
        format: format.unwrap_or_else(|| "cpio".to_string()),
        compressor: compressor.unwrap_or_else(|| "gzip".to_string()),
    })
}

/// Validates the payload declaration and returns its offset and codec.
fn resolve(stream: &mut PeekReader<'_>) -> Result<(u64, Codec)> {
    let info = payload_info(stream)?;
    if info.format != "cpio" {
        return Err(Error::unsupported(
            "rpm",
            format!("payload format '{}'", info.format),
        ));
    }
    let codec = Codec::from_rpm_compressor(&info.compressor).ok_or_else(|| {
        Error::unsupported("rpm", format!("payload compressor '{}'", info.compressor))
    })?;
    stream.seek(SeekFrom::Start(info.offset))?;
    codec
        .probe(stream)
        .map_err(|e| Error::invalid("rpm", format!("{codec} payload: {e}")))?;
    stream.seek(SeekFrom::Start(info.offset))?;
    Ok((info.offset, codec))
}

fn open(mut stream: PeekReader<'_>, _size: SizeHint) -> OpenResult<'_> {
    let codec = match resolve(&mut stream) {
        Ok((offset, codec)) => {
            log::debug!("rpm payload at {offset} compressed with {codec}");
            codec
        }
        Err(e) => return Err(Rejected::new(e, stream)),
    };
    match codec.decoder(stream.commit()) {
        Ok(reader) => Ok(Box::new(CpioArchive::new("rpm", reader))),
        Err(e) => Err(Rejected::consumed(Error::invalid("rpm", e.to_string()))),
    }
}

/// Serializes an rpm with an empty signature and the given payload tags.
#[cfg(test)]
fn build(tags: &[(u32, &str)], payload: &[u8]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.resize(LEAD_LEN as usize, 0);

    let intro = |out: &mut Vec<u8>, entries: u32, data_len: u32| {
        out.extend_from_slice(HEADER_MAGIC);
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&entries.to_be_bytes());
        out.extend_from_slice(&data_len.to_be_bytes());
    };
    intro(&mut out, 0, 0);
    out.resize((out.len() as u64).next_multiple_of(8) as usize, 0);

    let mut store = Vec::new();
    let mut index = Vec::new();
    for (tag, value) in tags {
        index.extend_from_slice(&tag.to_be_bytes());
        index.extend_from_slice(&TYPE_STRING.to_be_bytes());
        index.extend_from_slice(&(store.len() as u32).to_be_bytes());
        index.extend_from_slice(&1u32.to_be_bytes());
        store.extend_from_slice(value.as_bytes());
        store.push(0);
    }
    intro(&mut out, tags.len() as u32, store.len() as u32);
    out.extend(index);
    out.extend(store);
    out.extend_from_slice(payload);
    out
}
