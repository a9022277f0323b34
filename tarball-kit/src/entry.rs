use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::raw::{RawEntry, RawEntryRef};

/// One member's content and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: String,
    pub content: Vec<u8>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new<S: Into<String>, C: Into<Vec<u8>>>(path: S, content: C) -> Entry {
        Entry {
            path: path.into(),
            content: content.into(),
            created: None,
            modified: None,
        }
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Entry {
        self.created = Some(created);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Entry {
        self.modified = Some(modified);
        self
    }

    /// Read `file` into an entry named `name`, with its timestamps taken from the
    /// filesystem.
    pub fn from_file<P: AsRef<Path>, S: Into<String>>(file: P, name: S) -> Result<Entry> {
        let file = file.as_ref();
        let meta = std::fs::metadata(file).map_err(|e| Error::Io(e, file.to_path_buf()))?;
        let content = std::fs::read(file).map_err(|e| Error::Io(e, file.to_path_buf()))?;
        let (created, modified) = crate::fs::timestamps(&meta);

        Ok(Entry {
            path: name.into(),
            content,
            created,
            modified,
        })
    }

    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

impl From<RawEntry> for Entry {
    fn from(raw: RawEntry) -> Entry {
        Entry {
            path: raw.path,
            content: raw.content,
            created: raw.created,
            modified: raw.modified,
        }
    }
}

impl From<&Entry> for RawEntry {
    fn from(entry: &Entry) -> RawEntry {
        RawEntry {
            path: entry.path.clone(),
            content: entry.content.clone(),
            created: entry.created,
            modified: entry.modified,
        }
    }
}

impl<'a> From<&'a Entry> for RawEntryRef<'a> {
    fn from(entry: &'a Entry) -> RawEntryRef<'a> {
        RawEntryRef {
            path: &entry.path,
            content: &entry.content,
            created: entry.created.as_ref(),
            modified: entry.modified.as_ref(),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tarentry({}, size: {}", self.path, self.size())?;
        crate::item::write_times(f, self.created.as_ref(), self.modified.as_ref())?;
        f.write_str(")")
    }
}
