use std::io::Write;
use std::path::PathBuf;

use tarball_kit::TarballReader;

use crate::error::{Error, Result};

pub fn run(path: PathBuf, member: String) -> Result<()> {
    let reader = TarballReader::new(&path);
    let data = reader
        .read_path(&member)
        .map_err(|source| Error::ReadMember { member, source })?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(&data)
        .and_then(|_| out.flush())
        .map_err(|source| Error::WriteOutput { source })
}
