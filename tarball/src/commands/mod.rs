use std::path::{Path, PathBuf};

use tarball_kit::{ArchivePath, Entry, TarballWriter};

use crate::error::{Error, Result};

pub mod append;
pub mod cat;
pub mod create;
pub mod extract;
pub mod list;
pub mod scan;

pub use append::run as append;
pub use cat::run as cat;
pub use create::run as create;
pub use extract::run as extract;
pub use list::run as list;
pub use scan::run as scan;

/// Options shared by the commands that add files.
#[derive(Debug, Clone, Copy)]
pub struct AddOptions {
    pub recursive: bool,
    pub all: bool,
    pub verbose: bool,
}

/// Expand the selected paths into `(file, member name)` pairs, walking directories when
/// recursion is enabled.
fn collect_files(selected: &[PathBuf], options: AddOptions) -> Result<Vec<(PathBuf, ArchivePath)>> {
    let mut out = vec![];

    for root in selected {
        if !root.is_dir() {
            let name = ArchivePath::new(root).map_err(|source| Error::InvalidPath {
                path: root.clone(),
                source,
            })?;
            out.push((root.clone(), name));
            continue;
        }

        if !options.recursive {
            return Err(Error::IsDirectory { path: root.clone() });
        }

        for entry in jwalk::WalkDir::new(root)
            .skip_hidden(!options.all)
            .sort(true)
        {
            let entry = entry.map_err(|source| Error::ProcessDirEntry { source })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let name = ArchivePath::relative_to(&path, root).map_err(|source| {
                Error::InvalidPath {
                    path: path.clone(),
                    source,
                }
            })?;
            out.push((path, name));
        }
    }

    Ok(out)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Collect the files to add to `archive`, refusing to go on if the archive is among them.
/// Runs before the archive is opened, so a refused command leaves it untouched.
fn files_to_add(
    archive: &Path,
    selected: &[PathBuf],
    options: AddOptions,
) -> Result<Vec<(PathBuf, ArchivePath)>> {
    if selected.is_empty() {
        return Err(Error::NoFilesSpecified);
    }

    let files = collect_files(selected, options)?;
    for (file, _) in files.iter() {
        if file == archive || is_same_file(file, archive) {
            return Err(Error::ArchiveSelf { path: file.clone() });
        }
    }

    Ok(files)
}

/// Add every collected file to `writer`, one member per file.
fn add_files(
    writer: &mut TarballWriter,
    files: &[(PathBuf, ArchivePath)],
    verbose: bool,
) -> Result<usize> {
    for (file, name) in files.iter() {
        let entry = Entry::from_file(file, name.as_str()).map_err(|source| Error::AddFile {
            path: file.clone(),
            source,
        })?;
        writer.write_entry(&entry).map_err(|source| Error::AddFile {
            path: file.clone(),
            source,
        })?;

        if verbose {
            println!("{}", name);
        }
    }

    Ok(files.len())
}
