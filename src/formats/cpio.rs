//! SVR4 "newc" cpio archives, the payload format of rpm packages.

use std::io::Read;

use crate::archive::{Archive, Entry};
use crate::bounded::{Payload, read_up_to, skip};
use crate::error::{Error, Result};

const HEADER_LEN: usize = 110;
const MAGIC_NEWC: &[u8] = b"070701";
const MAGIC_CRC: &[u8] = b"070702";
const TRAILER: &str = "TRAILER!!!";
const MAX_NAME_LEN: u64 = 4096;

const MODE_TYPE_MASK: u32 = 0o170000;
const MODE_REGULAR: u32 = 0o100000;

#[derive(Debug)]
struct Header {
    name: String,
    mode: u32,
    size: u64,
}

/// Reads one 8-digit hexadecimal header field.
fn hex_field(header: &[u8; HEADER_LEN], index: usize) -> Result<u32> {
    let start = 6 + index * 8;
    std::str::from_utf8(&header[start..start + 8])
        .ok()
        .and_then(|field| u32::from_str_radix(field, 16).ok())
        .ok_or_else(|| Error::invalid("cpio", format!("bad header field {index}")))
}

fn pad4(len: u64) -> u64 {
    (4 - len % 4) % 4
}

/// A cpio session yielding regular files.
pub(crate) struct CpioArchive<R> {
    format: &'static str,
    reader: R,
    remaining: u64,
    padding: u64,
    eof: bool,
}

impl<R: Read> CpioArchive<R> {
    pub(crate) fn new(format: &'static str, reader: R) -> Self {
        Self {
            format,
            reader,
            remaining: 0,
            padding: 0,
            eof: false,
        }
    }

    fn read_header(&mut self) -> Result<Option<Header>> {
        let mut raw = [0u8; HEADER_LEN];
        match read_up_to(&mut self.reader, &mut raw)? {
            0 => return Ok(None),
            HEADER_LEN => {}
            _ => return Err(Error::invalid("cpio", "truncated header")),
        }
        if &raw[..6] != MAGIC_NEWC && &raw[..6] != MAGIC_CRC {
            return Err(Error::unsupported("cpio", "header is not in newc format"));
        }

        let mode = hex_field(&raw, 1)?;
        let size = u64::from(hex_field(&raw, 6)?);
        let name_len = u64::from(hex_field(&raw, 11)?);
        if name_len == 0 || name_len > MAX_NAME_LEN {
            return Err(Error::invalid("cpio", format!("name length {name_len}")));
        }
        let mut name = vec![0u8; name_len as usize];
        self.reader.read_exact(&mut name)?;
        skip(&mut self.reader, pad4(HEADER_LEN as u64 + name_len))?;
        name.pop();

        Ok(Some(Header {
            name: String::from_utf8_lossy(&name).into_owned(),
            mode,
            size,
        }))
    }

    fn next_file(&mut self) -> Result<Option<Header>> {
        skip(&mut self.reader, self.remaining + self.padding)?;
        self.remaining = 0;
        self.padding = 0;

        while let Some(header) = self.read_header()? {
            if header.name == TRAILER {
                return Ok(None);
            }
            let padding = pad4(header.size);
            if header.mode & MODE_TYPE_MASK == MODE_REGULAR {
                self.remaining = header.size;
                self.padding = padding;
                return Ok(Some(header));
            }
            skip(&mut self.reader, header.size + padding)?;
        }
        Ok(None)
    }
}

impl<R: Read> Archive for CpioArchive<R> {
    fn format(&self) -> &'static str {
        self.format
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        if self.eof {
            return Ok(None);
        }
        let header = match self.next_file() {
            Ok(Some(header)) => header,
            Ok(None) => {
                self.eof = true;
                return Ok(None);
            }
            Err(e) => {
                self.eof = true;
                return Err(e);
            }
        };
        let payload = Payload::new(&mut self.reader, &mut self.remaining);
        Ok(Some(
            Entry::from_path(&header.name, payload).with_size(Some(header.size)),
        ))
    }
}

/// Serializes a newc archive; shared with the rpm tests.
#[cfg(test)]
pub(crate) fn build(entries: &[(&str, u32, &[u8])]) -> Vec<u8> {
    fn record(out: &mut Vec<u8>, name: &str, mode: u32, data: &[u8]) {
        let name_len = name.len() + 1;
        let fields = [0, mode, 0, 0, 1, 0, data.len() as u32, 0, 0, 0, 0, name_len as u32, 0];
        out.extend_from_slice(MAGIC_NEWC);
        for field in fields {
            out.extend_from_slice(format!("{field:08X}").as_bytes());
        }
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        out.resize(out.len() + pad4((HEADER_LEN + name_len) as u64) as usize, 0);
        out.extend_from_slice(data);
        out.resize(out.len() + pad4(data.len() as u64) as usize, 0);
    }

    let mut out = Vec::new();
    for (name, mode, data) in entries {
        record(&mut out, name, *mode, data);
    }
    record(&mut out, TRAILER, 0, &[]);
    out
}
