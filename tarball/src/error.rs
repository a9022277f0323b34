use std::path::PathBuf;

use miette::Diagnostic;
use tarball_kit::path::IntoArchivePathError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("Cannot handle path `{}`", .path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: IntoArchivePathError,
    },

    #[error("Cannot open archive `{}`", .path.display())]
    #[diagnostic(help("Is this a tar, tar.gz or tar.bz2 file?"))]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot create archive `{}`", .path.display())]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot read archive `{}`", .path.display())]
    #[diagnostic(help("The archive may be truncated or damaged"))]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot read `{member}` from archive")]
    #[diagnostic(help("Use `tarball l` to see the files in the archive"))]
    ReadMember {
        member: String,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot add file to archive `{}`", .path.display())]
    AddFile {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot finish archive `{}`", .path.display())]
    FinishArchive {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot extract archive `{}`", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot scan directory `{}`", .path.display())]
    ScanDirectory {
        path: PathBuf,
        #[source]
        source: tarball_kit::Error,
    },

    #[error("Cannot process directory entry")]
    ProcessDirEntry {
        #[source]
        source: jwalk::Error,
    },

    #[error("Cannot write output")]
    WriteOutput {
        #[source]
        source: std::io::Error,
    },

    #[error("Cowardly refusing to archive the archive itself: `{}`", .path.display())]
    ArchiveSelf { path: PathBuf },

    #[error("`{}` is a directory", .path.display())]
    #[diagnostic(help("Use -r/--recursive to add its contents"))]
    IsDirectory { path: PathBuf },

    #[error("No files specified to add to archive")]
    #[diagnostic(help("Specify one or more files or directories to archive"))]
    NoFilesSpecified,
}
