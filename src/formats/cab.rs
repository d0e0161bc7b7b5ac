//! Microsoft cabinet files.

use crate::archive::{Archive, Entry, OpenResult, Rejected, SizeHint};
use crate::bounded::SizedView;
use crate::catalog::FormatDescriptor;
use crate::error::{Error, Result};
use crate::peek::PeekReader;

/// Cabinet signature.
pub const MAGIC: &[u8] = b"MSCF";

/// Catalog entry for cabinets.
pub const FORMAT: FormatDescriptor = FormatDescriptor {
    name: "cab",
    test,
    open,
};

fn test(stream: &mut PeekReader<'_>) -> bool {
    stream.matches_at(0, MAGIC)
}

/// Lists the files of a cabinet as (name, uncompressed size).
fn list_files<R: std::io::Read + std::io::Seek>(cabinet: &cab::Cabinet<R>) -> Vec<(String, u64)> {
    cabinet
        .folder_entries()
        .flat_map(|folder| folder.file_entries())
        .map(|file| (file.name().to_string(), u64::from(file.uncompressed_size())))
        .collect()
}

fn open(mut stream: PeekReader<'_>, size: SizeHint) -> OpenResult<'_> {
    let len = size.resolve(&mut stream);
    let probed = cab::Cabinet::new(SizedView::new(&mut stream, len)).map(|cabinet| list_files(&cabinet));
    match probed {
        Ok(files) if files.is_empty() => {
            return Err(Rejected::new(Error::invalid("cab", "cabinet holds no files"), stream));
        }
        Ok(_) => {}
        Err(e) => return Err(Rejected::new(Error::invalid("cab", e.to_string()), stream)),
    }
    match cab::Cabinet::new(SizedView::new(stream, len)) {
        Ok(cabinet) => Ok(Box::new(CabArchive {
            files: list_files(&cabinet).into_iter(),
            cabinet,
        })),
        Err(e) => Err(Rejected::consumed(Error::invalid("cab", e.to_string()))),
    }
}

/// A cabinet session.
pub struct CabArchive<'a> {
    cabinet: cab::Cabinet<SizedView<PeekReader<'a>>>,
    files: std::vec::IntoIter<(String, u64)>,
}

impl Archive for CabArchive<'_> {
    fn format(&self) -> &'static str {
        "cab"
    }

    fn is_eof(&self) -> bool {
        self.files.len() == 0
    }

    fn next_entry(&mut self) -> Result<Option<Entry<'_>>> {
        let Some((name, size)) = self.files.next() else {
            return Ok(None);
        };
        let reader = self
            .cabinet
            .read_file(&name)
            .map_err(|e| Error::invalid("cab", format!("{name}: {e}")))?;
        // Cabinets store DOS-style separators.
        let path = name.replace('\\', "/");
        Ok(Some(Entry::from_path(&path, reader).with_size(Some(size))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};

    fn build(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = cab::CabinetBuilder::new();
        let folder = builder.add_folder(cab::CompressionType::None);
        for (name, _) in files {
            folder.add_file(*name);
        }
        let mut writer = builder.build(Cursor::new(Vec::new())).unwrap();
        let mut index = 0;
        while let Some(mut file) = writer.next_file().unwrap() {
            file.write_all(files[index].1).unwrap();
            index += 1;
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_entries_use_forward_slashes() {
        let data = build(&[("setup\\readme.txt", &b"cabinet"[..])]);
        let hint = SizeHint::new(Some(data.len() as u64), 2048);
        let Ok(mut archive) = open(PeekReader::new(&data[..]), hint) else {
            panic!("rejected");
        };
        let mut entry = archive.next_entry().unwrap().unwrap();
        assert_eq!(entry.dir(), "setup/");
        assert_eq!(entry.name(), "readme.txt");
        let mut out = Vec::new();
        entry.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"cabinet");
        drop(entry);
        assert!(archive.next_entry().unwrap().is_none());
        assert!(archive.is_eof());
    }

    #[test]
    fn test_truncated_cabinet_rejected() {
        let data = build(&[("a.txt", &b"alpha"[..])]);
        let short = &data[..20];
        match open(PeekReader::new(short), SizeHint::new(None, 2048)) {
            Ok(_) => panic!("accepted"),
            Err(rejected) => assert!(rejected.stream.is_some()),
        }
    }
}
