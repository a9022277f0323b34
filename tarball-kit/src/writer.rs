use std::path::Path;

use crate::entry::Entry;
use crate::error::Result;
use crate::filter::Filter;
use crate::raw::{ArchiveWriter, RawEntryRef};

/// How [`TarballWriter::open`] should treat the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Create or truncate a plain archive.
    Create,
    /// Add to an existing archive, keeping its filter.
    Append,
    /// Create or truncate a gzip-compressed archive.
    Gzip,
    /// Create or truncate a bzip2-compressed archive.
    Bzip2,
}

/// Write access to an archive on disk.
///
/// After every successful write the file holds a complete archive, trailer included.
#[derive(Debug)]
pub struct TarballWriter {
    inner: ArchiveWriter,
}

impl TarballWriter {
    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<TarballWriter> {
        match mode {
            Mode::Create => Self::create(path),
            Mode::Append => Self::append(path),
            Mode::Gzip => Self::create_with_filter(path, Filter::Gzip),
            Mode::Bzip2 => Self::create_with_filter(path, Filter::Bzip2),
        }
    }

    /// This will create a new, empty plain archive, truncating any file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<TarballWriter> {
        Self::create_with_filter(path, Filter::None)
    }

    pub fn create_with_filter<P: AsRef<Path>>(path: P, filter: Filter) -> Result<TarballWriter> {
        Ok(TarballWriter {
            inner: ArchiveWriter::create(path, filter)?,
        })
    }

    /// This will open an existing archive for appending, and error if the file is missing or
    /// does not scan as an archive.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<TarballWriter> {
        Ok(TarballWriter {
            inner: ArchiveWriter::append(path)?,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    #[inline(always)]
    pub fn filter(&self) -> Filter {
        self.inner.filter()
    }

    /// Write `content` as a member named `path`, without timestamps.
    pub fn write_data<C: Into<Vec<u8>>, S: Into<String>>(
        &mut self,
        content: C,
        path: S,
    ) -> Result<()> {
        self.write_entry(&Entry::new(path, content))
    }

    pub fn write_entry(&mut self, entry: &Entry) -> Result<()> {
        self.inner.write(RawEntryRef::from(entry))
    }

    /// Write entries in order, stopping at the first failure. Entries written before the
    /// failure stay in the archive.
    pub fn write_entries<'a, I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        for entry in entries {
            self.write_entry(entry)?;
        }
        Ok(())
    }

    /// Sync the archive to disk and return its length in bytes.
    pub fn finish(self) -> Result<u64> {
        self.inner.finish()
    }
}
