use std::fs::{File, OpenOptions};
use std::io::{prelude::*, BufWriter, SeekFrom};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;

use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::item::{Item, Location};
use crate::path::ArchivePath;
use crate::raw::ArchiveReader;

/// Read access to an archive on disk.
///
/// The reader holds only the path. Every operation opens the file anew, so results always
/// reflect what is on disk at the time of the call.
#[derive(Debug, Clone)]
pub struct TarballReader {
    path: PathBuf,
}

impl TarballReader {
    /// # Panics
    ///
    /// If `path` is empty.
    pub fn new<P: AsRef<Path>>(path: P) -> TarballReader {
        let path = path.as_ref();
        assert!(
            !path.as_os_str().is_empty(),
            "an archive reader needs a non-empty path"
        );
        TarballReader {
            path: path.to_path_buf(),
        }
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the archive and describe every regular member in it.
    pub fn catalog(&self) -> Result<Vec<Item>> {
        let reader = ArchiveReader::open(&self.path)?;
        let filter = reader.filter();
        let items = reader
            .items()?
            .into_iter()
            .map(|raw| Item::from_raw(raw, filter))
            .collect::<Vec<_>>();

        tracing::debug!(path = %self.path.display(), %filter, count = items.len(), "built catalog");

        Ok(items)
    }

    /// Decode the member at `path`, whatever the archive's filter.
    pub fn read_path(&self, path: &str) -> Result<Vec<u8>> {
        ArchiveReader::open(&self.path)?.read_data(path)
    }

    /// Read an item's content. Direct items are read straight from their byte range
    /// without scanning; filtered ones are looked up by path.
    pub fn read_item(&self, item: &Item) -> Result<Vec<u8>> {
        match item.location() {
            Location::Direct(range) => {
                let mut data = vec![0u8; (range.end - range.start) as usize];
                let mut file = self.open_file()?;
                file.seek(SeekFrom::Start(range.start))
                    .and_then(|_| file.read_exact(&mut data))
                    .map_err(|e| Error::Io(e, self.path.clone()))?;
                Ok(data)
            }
            Location::Filtered { .. } => self.read_path(item.path()),
        }
    }

    /// Stream the archive's members in order.
    pub fn entries(&self) -> Entries {
        match ArchiveReader::open(&self.path) {
            Ok(reader) => Entries {
                path: self.path.clone(),
                reader: Some(reader),
                error: None,
            },
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "entry stream could not start");
                Entries {
                    path: self.path.clone(),
                    reader: None,
                    error: Some(err),
                }
            }
        }
    }

    /// Map a direct item's content into memory.
    ///
    /// # Safety
    ///
    /// The same contract as any file mapping: the archive must not be truncated or written
    /// to while the map is alive.
    pub unsafe fn memory_map(&self, item: &Item) -> Result<memmap2::Mmap> {
        let range = item
            .range()
            .ok_or_else(|| Error::NotAddressable(item.path().to_string()))?;
        let file = self.open_file()?;

        MmapOptions::new()
            .offset(range.start)
            .len((range.end - range.start) as usize)
            .map(&file)
            .map_err(|e| Error::Io(e, self.path.clone()))
    }

    /// Write every member below `dest`, returning how many were written. Member names are
    /// sanitised first, so nothing lands outside `dest`. Unlike [`TarballReader::entries`],
    /// any failure stops the extraction and is returned.
    pub fn extract_all<P: AsRef<Path>>(&self, dest: P) -> Result<usize> {
        let dest = dest.as_ref();
        let mut reader = ArchiveReader::open(&self.path)?;
        let mut count = 0;

        while let Some(raw) = reader.read_next()? {
            let member = ArchivePath::new(&raw.path)
                .map_err(|_| Error::InvalidMemberPath(raw.path.clone()))?;
            let target = dest.join(member.to_path_buf());
            let io = |e: std::io::Error| Error::Io(e, target.clone());

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io)?;
            }
            let mut out = BufWriter::new(File::create(&target).map_err(io)?);
            out.write_all(&raw.content).map_err(io)?;
            out.flush().map_err(io)?;

            tracing::debug!(member = %member, target = %target.display(), "extracted");
            count += 1;
        }

        Ok(count)
    }

    fn open_file(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(|e| Error::OpenFailed(e, self.path.clone()))
    }
}

impl<'a> IntoIterator for &'a TarballReader {
    type Item = Entry;
    type IntoIter = Entries;

    fn into_iter(self) -> Entries {
        self.entries()
    }
}

/// A lazy, forward-only stream of an archive's members.
///
/// The stream is lenient: a failure to open the archive or to decode a member ends the
/// stream rather than being yielded. The failure is logged and kept; check
/// [`Entries::error`] after iteration to tell a complete stream from a cut-short one.
#[derive(Debug)]
pub struct Entries {
    path: PathBuf,
    reader: Option<ArchiveReader>,
    error: Option<Error>,
}

impl Entries {
    /// The failure that ended this stream early, if any.
    #[inline(always)]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<Error> {
        self.error
    }
}

impl Iterator for Entries {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let reader = self.reader.as_mut()?;

        match reader.read_next() {
            Ok(Some(raw)) => Some(Entry::from(raw)),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "entry stream ended early");
                self.reader = None;
                self.error = Some(err);
                None
            }
        }
    }
}

impl FusedIterator for Entries {}
