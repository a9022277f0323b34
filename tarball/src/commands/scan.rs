use std::path::PathBuf;

use crate::error::{Error, Result};

pub fn run(dir: PathBuf) -> Result<()> {
    let archives = tarball_kit::fs::list_archives(&dir).map_err(|source| Error::ScanDirectory {
        path: dir.clone(),
        source,
    })?;

    for archive in archives {
        println!("{}", archive.display());
    }

    Ok(())
}
