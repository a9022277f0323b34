//! Filesystem utilities: recognising archive files and reading timestamps for new entries.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Filename suffixes treated as TAR-family archives.
pub const ARCHIVE_SUFFIXES: [&str; 5] = [".tar", ".tgz", ".tar.gz", ".tar.bz2", ".tbz"];

pub fn is_archive_name<S: AsRef<str>>(name: S) -> bool {
    let name = name.as_ref();
    ARCHIVE_SUFFIXES
        .iter()
        .any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
}

/// The regular files directly inside `dir` whose names carry an archive suffix, sorted.
pub fn list_archives<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let io = |e: std::io::Error| Error::Io(e, dir.to_path_buf());

    let mut out = vec![];
    for entry in std::fs::read_dir(dir).map_err(io)? {
        let entry = entry.map_err(io)?;
        if !entry.file_type().map_err(io)?.is_file() {
            continue;
        }
        if entry.file_name().to_str().map(is_archive_name).unwrap_or(false) {
            out.push(entry.path());
        }
    }

    out.sort();
    Ok(out)
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// `(created, modified)` for a file, as far as the platform reports them.
///
/// On Unix without birth time support, the inode change time stands in for `created`.
#[cfg(unix)]
pub fn timestamps(meta: &std::fs::Metadata) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    use chrono::TimeZone;
    use std::os::unix::fs::MetadataExt;

    let created = meta
        .created()
        .ok()
        .map(to_utc)
        .or_else(|| Utc.timestamp_opt(meta.ctime(), 0).single());
    let modified = meta.modified().ok().map(to_utc);

    (created, modified)
}

#[cfg(not(unix))]
pub fn timestamps(meta: &std::fs::Metadata) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (
        meta.created().ok().map(to_utc),
        meta.modified().ok().map(to_utc),
    )
}
