//! Read and write TAR archives, plain or wrapped in gzip or bzip2.
//!
//! [`TarballReader`] exposes an archive as a catalog of [`Item`]s, reads members by path or
//! by item, and streams [`Entry`] values lazily. [`TarballWriter`] creates archives and
//! appends to them, keeping a valid end-of-archive marker after every write.

mod entry;
mod error;
mod filter;
mod item;
mod reader;
mod writer;

pub mod fs;
pub mod path;
pub mod raw;

pub use entry::Entry;
pub use error::{Error, ErrorKind, Result};
pub use filter::{constants, Filter};
pub use item::{Item, Location};
pub use path::ArchivePath;
pub use reader::{Entries, TarballReader};
pub use writer::{Mode, TarballWriter};
