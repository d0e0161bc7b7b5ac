//! Destination paths for archive entries.
//!
//! An entry at `dir`/`name` inside the archive at `parent` is written to
//! `parent/dir/name`, so nested archives become directories named after the
//! archive file. Entry paths come from untrusted headers; only plain
//! components are kept.

use std::path::{Component, Path, PathBuf};

/// Returns `true` if `part` is a single normal path component.
fn is_plain(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Builds the destination of the `ordinal`-th (1-based) entry of an archive.
///
/// Empty, `.` and `..` components and any root are dropped. If the name
/// leaves nothing behind, `pt_<ordinal>` is used instead.
///
/// ```rust
/// use std::path::Path;
/// use exploder::entry_path;
///
/// let path = entry_path(Path::new("out/a.tgz"), "docs/", "../../etc/passwd", 1);
/// assert_eq!(path, Path::new("out/a.tgz/docs/etc/passwd"));
///
/// let path = entry_path(Path::new("out/a.gz"), "", "", 3);
/// assert_eq!(path, Path::new("out/a.gz/pt_3"));
/// ```
pub fn entry_path(parent: &Path, dir: &str, name: &str, ordinal: u64) -> PathBuf {
    let mut path = parent.to_path_buf();
    path.extend(dir.split('/').filter(|part| is_plain(part)));

    let mut named = false;
    for part in name.split('/').filter(|part| is_plain(part)) {
        path.push(part);
        named = true;
    }
    if !named {
        path.push(format!("pt_{ordinal}"));
    }
    path
}
