//! Shared session type for single-content compressed streams.

use std::io::{Read, Seek};

use crate::archive::{Archive, Entry, OpenResult, Rejected};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// A session that yields its whole decompressed stream as `pt_1`.
pub(crate) struct SingleStream<'a> {
    format: &'static str,
    reader: Box<dyn Read + 'a>,
    yielded: bool,
}

impl<'a> SingleStream<'a> {
    pub(crate) fn new(format: &'static str, reader: Box<dyn Read + 'a>) -> Self {
        Self {
            format,
            reader,
            yielded: false,
        }
    }
}

impl Archive for SingleStream<'_> {
    fn format(&self) -> &'static str {
        self.format
    }

    fn is_eof(&self) -> bool {
        self.yielded
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        if self.yielded {
            return Ok(None);
        }
        self.yielded = true;
        Ok(Some(Entry::new("", "pt_1", &mut self.reader)))
    }
}

/// Opens `stream` as a single `codec` stream after probing one output byte.
pub(crate) fn open<'a>(
    format: &'static str,
    codec: Codec,
    mut stream: PeekReader<'a>,
) -> OpenResult<'a> {
    let probed = codec.probe(&mut stream);
    if let Err(e) = stream.rewind() {
        return Err(Rejected::new(e.into(), stream));
    }
    if let Err(e) = probed {
        return Err(Rejected::new(Error::invalid(format, e.to_string()), stream));
    }

    match codec.decoder(stream.commit()) {
        Ok(reader) => Ok(Box::new(SingleStream::new(format, reader))),
        Err(e) => Err(Rejected::consumed(Error::invalid(format, e.to_string()))),
    }
}
