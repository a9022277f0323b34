use std::path::PathBuf;

use tarball_kit::TarballReader;

use crate::error::{Error, Result};

pub fn run(path: PathBuf, output: Option<PathBuf>, verbose: bool) -> Result<()> {
    let output = output.unwrap_or_else(|| PathBuf::from("."));
    let reader = TarballReader::new(&path);

    let count = reader
        .extract_all(&output)
        .map_err(|source| Error::Extract {
            path: path.clone(),
            source,
        })?;

    if verbose {
        println!("Extracted {} files to {}", count, output.display());
    }

    Ok(())
}
