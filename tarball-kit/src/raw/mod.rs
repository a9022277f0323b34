//! The raw archive engine: walks TAR headers through an optional gzip/bzip2 filter, and
//! writes members while keeping the end-of-archive trailer intact.
//!
//! [`ArchiveReader`] is a one-pass cursor over an archive. [`ArchiveWriter`] owns an archive
//! for writing; every [`ArchiveWriter::write`] leaves a complete, readable archive on disk.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, prelude::*, BufReader, BufWriter, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tar::{EntryType, Header};

use crate::error::{Error, Result};
use crate::filter::{constants::MAGIC_LEN, Filter};

mod header;

use self::header::{
    encode_header, entry_size, is_content, is_valid_member_path, member_header, padding, read_block,
    stored_size, truncated, verify_checksum, Extensions, MemberHeader, BLOCK_SIZE, TRAILER,
};

/// A member as located by a header scan, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub path: String,
    /// Position of the member's body in the decoded TAR stream. For unfiltered archives this
    /// is also its position in the file.
    pub offset: u64,
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// A decoded member with its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub path: String,
    pub content: Vec<u8>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl<'a> From<&'a RawEntry> for RawEntryRef<'a> {
    fn from(entry: &'a RawEntry) -> RawEntryRef<'a> {
        RawEntryRef {
            path: &entry.path,
            content: &entry.content,
            created: entry.created.as_ref(),
            modified: entry.modified.as_ref(),
        }
    }
}

/// A member to be written, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct RawEntryRef<'a> {
    pub path: &'a str,
    pub content: &'a [u8],
    pub created: Option<&'a DateTime<Utc>>,
    pub modified: Option<&'a DateTime<Utc>>,
}

pub struct ArchiveReader<R = Box<dyn Read>> {
    path: PathBuf,
    filter: Filter,
    source: R,
    /// Offset into the decoded TAR stream.
    position: u64,
    /// Body and padding of the last member handed out that has not been consumed yet.
    pending: u64,
    /// Where the end-of-archive marker starts, once it has been reached.
    trailer: Option<u64>,
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .field("filter", &self.filter)
            .field("position", &self.position)
            .field("trailer", &self.trailer)
            .finish_non_exhaustive()
    }
}

impl ArchiveReader {
    /// Open an archive for reading, detecting its filter from the leading bytes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ArchiveReader> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::OpenFailed(e, path.clone()))?;
        let mut reader = BufReader::new(file);

        let filter = {
            let magic = reader
                .fill_buf()
                .map_err(|e| Error::OpenFailed(e, path.clone()))?;
            Filter::detect(&magic[..magic.len().min(MAGIC_LEN)])
                .map_err(|name| Error::UnsupportedFilter(name, path.clone()))?
        };

        tracing::debug!(path = %path.display(), %filter, "opened archive");

        let source = filter.decoder(reader);
        Ok(ArchiveReader::from_reader(path, filter, source))
    }

    /// Read the remainder of the decoded TAR stream into memory.
    pub(crate) fn into_decoded(mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.source
            .read_to_end(&mut data)
            .map_err(|e| Error::Malformed(e, self.path.clone()))?;
        Ok(data)
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Walk an already decoded TAR stream. `path` is only used for error reporting.
    pub fn from_reader<P: AsRef<Path>>(path: P, filter: Filter, source: R) -> ArchiveReader<R> {
        ArchiveReader {
            path: path.as_ref().to_path_buf(),
            filter,
            source,
            position: 0,
            pending: 0,
            trailer: None,
        }
    }

    #[inline(always)]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enumerate every regular member. When a path occurs more than once, the last
    /// occurrence is kept and the earlier ones are dropped.
    pub fn items(mut self) -> Result<Vec<RawItem>> {
        let mut items = vec![];

        while let Some(member) = self.next_member().map_err(|e| self.malformed(e))? {
            items.push(RawItem {
                path: member.path,
                offset: self.position,
                size: member.size,
                created: member.created,
                modified: member.modified,
            });
        }

        tracing::debug!(
            path = %self.path.display(),
            count = items.len(),
            trailer = ?self.trailer,
            "scanned archive"
        );

        Ok(last_occurrence_wins(items))
    }

    /// Scan for `name` and decode its content. Consistent with [`ArchiveReader::items`], a
    /// duplicated path yields the content of its last occurrence.
    pub fn read_data(mut self, name: &str) -> Result<Vec<u8>> {
        let mut found = None;

        while let Some(member) = self.next_member().map_err(|e| self.malformed(e))? {
            if member.path == name {
                let content = self
                    .read_body(member.size, "member body")
                    .map_err(|e| self.malformed(e))?;
                found = Some(content);
            }
        }

        found.ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Decode the next member, or `None` at the end of the archive.
    pub fn read_next(&mut self) -> Result<Option<RawEntry>> {
        let member = match self.next_member().map_err(|e| self.malformed(e))? {
            Some(member) => member,
            None => return Ok(None),
        };

        let content = self
            .read_body(member.size, "member body")
            .map_err(|e| self.malformed(e))?;

        Ok(Some(RawEntry {
            path: member.path,
            content,
            created: member.created,
            modified: member.modified,
        }))
    }

    /// Scan to the end of the archive and return the offset of its end-of-archive marker,
    /// which is where the next member is to be written.
    pub fn trailer_offset(mut self) -> Result<u64> {
        while self.next_member().map_err(|e| self.malformed(e))?.is_some() {}
        Ok(self.trailer.unwrap_or(self.position))
    }

    #[inline(always)]
    fn malformed(&self, err: io::Error) -> Error {
        Error::Malformed(err, self.path.clone())
    }

    fn skip(&mut self, len: u64, what: &str) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.source).take(len), &mut io::sink())?;
        self.position += skipped;
        if skipped < len {
            return Err(truncated(what));
        }
        Ok(())
    }

    fn read_body(&mut self, size: u64, what: &str) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(size.min(1 << 20) as usize);
        (&mut self.source).take(size).read_to_end(&mut data)?;
        self.position += data.len() as u64;
        if (data.len() as u64) < size {
            return Err(truncated(what));
        }
        self.pending -= size;
        Ok(data)
    }

    /// Advance to the next regular member and leave the stream at the start of its body.
    fn next_member(&mut self) -> io::Result<Option<MemberHeader>> {
        if self.trailer.is_some() {
            return Ok(None);
        }

        let mut extensions = Extensions::default();
        let mut block = [0u8; 512];

        loop {
            let pending = std::mem::take(&mut self.pending);
            self.skip(pending, "member body")?;

            let start = self.position;
            let filled = read_block(&mut self.source, &mut block)?;
            self.position += filled as u64;

            if filled == 0 || (filled == block.len() && block.iter().all(|b| *b == 0)) {
                self.trailer = Some(start);
                return Ok(None);
            }
            if filled < block.len() {
                return Err(truncated("a header block"));
            }

            let header = Header::from_byte_slice(&block);
            verify_checksum(header)?;
            let size = header.entry_size()?;
            self.pending = stored_size(size);

            match header.entry_type() {
                EntryType::GNULongName => {
                    let name = self.read_body(size, "a GNU long name")?;
                    extensions.set_long_name(name);
                }
                EntryType::XHeader => {
                    let data = self.read_body(size, "a PAX header")?;
                    extensions.absorb_pax(&data)?;
                }
                EntryType::GNULongLink | EntryType::XGlobalHeader => {}
                _ if is_content(header) => {
                    let member = member_header(header, extensions)?;
                    self.pending = stored_size(member.size);
                    tracing::trace!(
                        path = %member.path,
                        header = start,
                        size = member.size,
                        "found member"
                    );
                    return Ok(Some(member));
                }
                other => {
                    self.pending = stored_size(entry_size(header, &extensions)?);
                    tracing::trace!(entry_type = ?other, header = start, "skipping non-content header");
                    extensions = Extensions::default();
                }
            }
        }
    }
}

fn last_occurrence_wins(items: Vec<RawItem>) -> Vec<RawItem> {
    let keep: Vec<bool> = {
        let mut last = HashMap::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            last.insert(item.path.as_str(), index);
        }
        items
            .iter()
            .enumerate()
            .map(|(index, item)| last.get(item.path.as_str()) == Some(&index))
            .collect()
    };

    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| if keep { Some(item) } else { None })
        .collect()
}

#[derive(Debug)]
enum Sink {
    /// Plain TAR, written in place. `end` is where the trailer starts.
    Plain { file: File, end: u64 },
    /// The decoded TAR stream without its trailer, re-encoded on every write.
    Filtered { tar: Vec<u8> },
}

#[derive(Debug)]
pub struct ArchiveWriter {
    path: PathBuf,
    filter: Filter,
    sink: Sink,
}

impl ArchiveWriter {
    /// Create (or truncate) an archive. An empty, valid archive is on disk when this returns.
    pub fn create<P: AsRef<Path>>(path: P, filter: Filter) -> Result<ArchiveWriter> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::OpenFailed(e, path.clone()))?;

        let mut writer = ArchiveWriter {
            path,
            filter,
            sink: match filter {
                Filter::None => Sink::Plain { file, end: 0 },
                _ => {
                    drop(file);
                    Sink::Filtered { tar: Vec::new() }
                }
            },
        };

        writer
            .seal()
            .map_err(|e| Error::OpenFailed(e, writer.path.clone()))?;

        tracing::debug!(path = %writer.path.display(), %filter, "created archive");

        Ok(writer)
    }

    /// Open an existing archive for appending. The archive is scanned to validate it and to
    /// find its trailer, which the next write replaces.
    pub fn append<P: AsRef<Path>>(path: P) -> Result<ArchiveWriter> {
        let path = path.as_ref().to_path_buf();
        let reader = ArchiveReader::open(&path)?;
        let filter = reader.filter();

        let not_an_archive = |err: Error| match err {
            Error::Malformed(source, path) => Error::NotAnArchive(source, path),
            other => other,
        };
        let empty = || {
            Error::NotAnArchive(
                io::Error::new(io::ErrorKind::UnexpectedEof, "file is empty"),
                path.clone(),
            )
        };

        let sink = match filter {
            Filter::None => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .map_err(|e| Error::OpenFailed(e, path.clone()))?;
                let len = file
                    .metadata()
                    .map_err(|e| Error::OpenFailed(e, path.clone()))?
                    .len();
                if len == 0 {
                    return Err(empty());
                }
                let end = reader.trailer_offset().map_err(not_an_archive)?;
                Sink::Plain { file, end }
            }
            _ => {
                let mut tar = reader.into_decoded().map_err(not_an_archive)?;
                if tar.is_empty() {
                    return Err(empty());
                }
                let end = ArchiveReader::from_reader(&path, filter, tar.as_slice())
                    .trailer_offset()
                    .map_err(not_an_archive)?;
                tar.truncate(end as usize);
                Sink::Filtered { tar }
            }
        };

        tracing::debug!(path = %path.display(), %filter, "opened archive for append");

        Ok(ArchiveWriter { path, filter, sink })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline(always)]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Append one member and rewrite the trailer after it.
    pub fn write<'a, E: Into<RawEntryRef<'a>>>(&mut self, entry: E) -> Result<()> {
        let entry = entry.into();
        if !is_valid_member_path(entry.path) {
            return Err(Error::InvalidMemberPath(entry.path.to_string()));
        }

        let size = entry.content.len() as u64;
        let header = encode_header(entry.path, size, entry.created, entry.modified);
        let pad = &TRAILER[..padding(size) as usize];
        let chunks: [&[u8]; 3] = [&header, entry.content, pad];

        let ArchiveWriter { path, filter, sink } = self;

        match sink {
            Sink::Plain { file, end } => {
                let start = *end;
                match write_plain(file, start, &chunks) {
                    Ok(new_end) => *end = new_end,
                    Err(err) => {
                        if let Err(seal_err) = seal_plain(file, start) {
                            tracing::warn!(
                                path = %path.display(),
                                error = %seal_err,
                                "could not restore trailer after failed write"
                            );
                        }
                        return Err(Error::Io(err, path.clone()));
                    }
                }
            }
            Sink::Filtered { tar } => {
                let start = tar.len();
                for chunk in chunks.iter() {
                    tar.extend_from_slice(chunk);
                }
                if let Err(err) = replace_filtered(path, *filter, tar) {
                    tar.truncate(start);
                    return Err(Error::Io(err, path.clone()));
                }
            }
        }

        tracing::debug!(
            path = %self.path.display(),
            member = entry.path,
            size,
            "wrote member"
        );

        Ok(())
    }

    /// Flush everything to stable storage and return the archive's length on disk.
    pub fn finish(self) -> Result<u64> {
        let ArchiveWriter { path, sink, .. } = self;
        match sink {
            Sink::Plain { file, .. } => {
                file.sync_all().map_err(|e| Error::Io(e, path.clone()))?;
                file.metadata()
                    .map(|meta| meta.len())
                    .map_err(|e| Error::Io(e, path))
            }
            Sink::Filtered { .. } => std::fs::metadata(&path)
                .map(|meta| meta.len())
                .map_err(|e| Error::Io(e, path)),
        }
    }

    fn seal(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Plain { file, end } => seal_plain(file, *end),
            Sink::Filtered { tar } => replace_filtered(&self.path, self.filter, tar),
        }
    }
}

/// Write `chunks` at `start`, followed by a fresh trailer, and cut off anything after it.
/// Returns the new trailer offset.
fn write_plain(file: &mut File, start: u64, chunks: &[&[u8]]) -> io::Result<u64> {
    file.seek(SeekFrom::Start(start))?;

    let mut written = 0u64;
    {
        let mut out = BufWriter::new(&mut *file);
        for chunk in chunks {
            out.write_all(chunk)?;
            written += chunk.len() as u64;
        }
        out.write_all(&TRAILER)?;
        out.flush()?;
    }

    let end = start + written;
    debug_assert_eq!(end % BLOCK_SIZE, 0);
    file.set_len(end + TRAILER.len() as u64)?;
    Ok(end)
}

fn seal_plain(file: &mut File, end: u64) -> io::Result<()> {
    file.seek(SeekFrom::Start(end))?;
    file.write_all(&TRAILER)?;
    file.set_len(end + TRAILER.len() as u64)?;
    file.flush()
}

/// Encode `tar` plus a trailer into a temporary file next to `path` and move it into place,
/// so the archive on disk is always either the previous or the new complete container.
fn replace_filtered(path: &Path, filter: Filter, tar: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = tempfile::NamedTempFile::new_in(dir)?;
    if let Ok(meta) = std::fs::metadata(path) {
        temp.as_file().set_permissions(meta.permissions())?;
    }

    let temp = filter
        .encode(BufWriter::new(temp), &[tar, &TRAILER])?
        .into_inner()
        .map_err(|e| e.into_error())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
