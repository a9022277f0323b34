use std::path::PathBuf;

use tarball_kit::TarballWriter;

use super::{add_files, files_to_add, AddOptions};
use crate::error::{Error, Result};

pub fn run(path: PathBuf, selected_files: Vec<PathBuf>, options: AddOptions) -> Result<()> {
    let files = files_to_add(&path, &selected_files, options)?;

    let mut writer = TarballWriter::append(&path).map_err(|source| Error::OpenArchive {
        path: path.clone(),
        source,
    })?;

    let count = add_files(&mut writer, &files, options.verbose)?;

    let len = writer
        .finish()
        .map_err(|source| Error::FinishArchive {
            path: path.clone(),
            source,
        })?;

    tracing::debug!(path = %path.display(), count, len, "appended to archive");

    Ok(())
}
