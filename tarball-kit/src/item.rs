use std::fmt;
use std::ops::Range;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::filter::Filter;
use crate::raw::RawItem;

/// Where a member's content lives inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Byte range of the content inside the container file.
    Direct(Range<u64>),
    /// Content behind a compression filter; only reachable by decoding.
    Filtered { filter: Filter, size: u64 },
}

/// Catalog descriptor of one member of an opened archive.
///
/// Items are a snapshot: they hold no file handle, and become stale once the archive
/// is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    path: String,
    location: Location,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl Item {
    pub fn from_raw(raw: RawItem, filter: Filter) -> Item {
        let location = match filter {
            Filter::None => Location::Direct(raw.offset..raw.offset + raw.size),
            filter => Location::Filtered {
                filter,
                size: raw.size,
            },
        };

        Item {
            path: raw.path,
            location,
            created: raw.created,
            modified: raw.modified,
        }
    }

    /// The member's name as stored. In names that are not valid UTF-8, stray bytes and `%`
    /// are percent-encoded.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline(always)]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[inline(always)]
    pub fn is_compressed(&self) -> bool {
        matches!(self.location, Location::Filtered { .. })
    }

    pub fn size(&self) -> u64 {
        match &self.location {
            Location::Direct(range) => range.end - range.start,
            Location::Filtered { size, .. } => *size,
        }
    }

    /// The content's byte range in the container, for uncompressed archives.
    pub fn range(&self) -> Option<Range<u64>> {
        match &self.location {
            Location::Direct(range) => Some(range.clone()),
            Location::Filtered { .. } => None,
        }
    }

    #[inline(always)]
    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.created.as_ref()
    }

    #[inline(always)]
    pub fn modified(&self) -> Option<&DateTime<Utc>> {
        self.modified.as_ref()
    }
}

pub(crate) fn write_times(
    f: &mut fmt::Formatter<'_>,
    created: Option<&DateTime<Utc>>,
    modified: Option<&DateTime<Utc>>,
) -> fmt::Result {
    if let Some(created) = created {
        write!(
            f,
            ", created: {}",
            created.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
    }
    if let Some(modified) = modified {
        write!(
            f,
            ", modified: {}",
            modified.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
    }
    Ok(())
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "taritem({}, size: {}", self.path, self.size())?;
        if self.is_compressed() {
            f.write_str(", compressed: true")?;
        }
        write_times(f, self.created(), self.modified())?;
        f.write_str(")")
    }
}
