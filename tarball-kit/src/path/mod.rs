//! Member names and the filesystem paths they come from or are extracted to.
//!
//! Member names inside an archive always use `/` as their separator, carry no root and no
//! `.`/`..` components, and are NFC-normalised. [`ArchivePath`] is a name that has been through
//! that sanitisation, in either direction.

use std::{
    fmt,
    path::{Path, PathBuf},
};

mod error;

pub use self::error::IntoArchivePathError;

/// The separator used in member names.
pub const PATH_ARCHIVE_SEP: &str = "/";

#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchivePath(String);

/// Split `path` into clean components. Roots, prefixes and `.` are dropped, `..` removes the
/// previous component, and a component holding control characters, a backslash or
/// non-space separators makes the whole path unrepresentable.
pub fn sanitize<P: AsRef<Path>>(path: P) -> Option<Vec<String>> {
    use std::path::Component;
    use unic_normal::StrNormalForm;
    use unic_ucd::GeneralCategory;

    let mut out = vec![];

    for component in path.as_ref().components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(os_str) => out.push(
                os_str
                    .to_str()
                    .map(|x| x.trim())
                    .filter(|x| !x.is_empty())
                    .filter(|x| {
                        !x.chars().any(|c| {
                            let cat = GeneralCategory::of(c);
                            c == '\\'
                                || cat == GeneralCategory::Control
                                || (cat.is_separator() && c != ' ')
                        })
                    })
                    .map(|x| x.nfc().collect::<String>())?,
            ),
        }
    }

    Some(out)
}

impl ArchivePath {
    pub fn new<P: AsRef<Path>>(path: P) -> std::result::Result<ArchivePath, IntoArchivePathError> {
        let out = sanitize(&path).ok_or(IntoArchivePathError::UnrepresentableStr)?;

        if out.is_empty() {
            return Err(IntoArchivePathError::EmptyPath);
        }

        Ok(ArchivePath(out.join(PATH_ARCHIVE_SEP)))
    }

    /// Name a file found while walking `root` by its position relative to `root`'s parent,
    /// so `docs/a/b.txt` under `docs` becomes `docs/a/b.txt`.
    pub fn relative_to<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        root: Q,
    ) -> std::result::Result<ArchivePath, IntoArchivePathError> {
        let path = path.as_ref();
        let base = root.as_ref().parent().unwrap_or_else(|| Path::new(""));
        match path.strip_prefix(base) {
            Ok(relative) => ArchivePath::new(relative),
            Err(_) => ArchivePath::new(path),
        }
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A relative filesystem path for this member, built component by component so a
    /// member name can never escape the directory it is joined onto.
    pub fn to_path_buf(&self) -> PathBuf {
        self.iter().collect()
    }

    pub fn iter(&self) -> std::str::Split<'_, &str> {
        self.0.split(PATH_ARCHIVE_SEP)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ArchivePath> for String {
    fn from(path: ArchivePath) -> String {
        path.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
