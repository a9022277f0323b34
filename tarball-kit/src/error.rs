use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], for callers that branch on
/// "missing" versus "broken" rather than on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The file is missing, unreadable, or not a container we can handle.
    Open,
    /// The container is damaged: bad header, bad checksum, truncated body or a decode failure.
    Format,
    /// The requested member is not in the archive.
    NotFound,
    /// An operating system read, seek or write failed.
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open archive. Path: '{}'", .1.display())]
    OpenFailed(#[source] std::io::Error, PathBuf),

    #[error("Not a readable TAR archive. Path: '{}'", .1.display())]
    NotAnArchive(#[source] std::io::Error, PathBuf),

    #[error("Unsupported compression filter `{}`. Path: '{}'", .0, .1.display())]
    UnsupportedFilter(&'static str, PathBuf),

    #[error("Malformed archive data. Path: '{}'", .1.display())]
    Malformed(#[source] std::io::Error, PathBuf),

    #[error("Member path cannot be stored in a TAR header. Member: '{}'", .0)]
    InvalidMemberPath(String),

    #[error("Path not found in archive. Member: '{}'", .0)]
    NotFound(String),

    #[error("Member has no addressable byte range (archive is compressed). Member: '{}'", .0)]
    NotAddressable(String),

    #[error("I/O failure. Path: '{}'", .1.display())]
    Io(#[source] std::io::Error, PathBuf),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::OpenFailed(..) | Error::NotAnArchive(..) | Error::UnsupportedFilter(..) => {
                ErrorKind::Open
            }
            Error::Malformed(..) | Error::InvalidMemberPath(..) => ErrorKind::Format,
            Error::NotFound(..) => ErrorKind::NotFound,
            Error::NotAddressable(..) | Error::Io(..) => ErrorKind::Io,
        }
    }

    #[inline(always)]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
