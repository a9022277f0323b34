use std::fmt;
use std::io::{Read, Result, Write};

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

pub mod constants {
    /// Gzip id bytes followed by the deflate method.
    pub const GZIP_MAGIC: &[u8] = b"\x1f\x8b\x08";
    pub const BZIP2_MAGIC: &[u8] = b"BZh";
    /// Follows the bzip2 magic and block size digit when the stream has a block.
    pub const BZIP2_BLOCK_MAGIC: &[u8] = b"\x31\x41\x59\x26\x53\x59";
    /// Follows the bzip2 magic and block size digit when the stream is empty.
    pub const BZIP2_EOS_MAGIC: &[u8] = b"\x17\x72\x45\x38\x50\x90";
    pub const XZ_MAGIC: &[u8] = b"\xfd7zXZ\x00";
    pub const ZSTD_MAGIC: &[u8] = b"\x28\xb5\x2f\xfd";

    /// Enough leading bytes to check every known signature in full.
    pub const MAGIC_LEN: usize = 10;
}

use self::constants::*;

/// Whole-container compression wrapped around the TAR stream.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum Filter {
    #[default]
    None,
    Gzip,
    Bzip2,
}

impl Filter {
    #[inline(always)]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, Filter::None)
    }

    /// Identify the filter from the first bytes of a file. Anything that does not carry a
    /// known compression magic is taken to be plain TAR; the header walk decides whether it
    /// really is one. Compression formats we recognise but cannot decode come back as `Err`
    /// with their name.
    pub fn detect(magic: &[u8]) -> std::result::Result<Filter, &'static str> {
        if magic.starts_with(GZIP_MAGIC) {
            Ok(Filter::Gzip)
        } else if is_bzip2(magic) {
            Ok(Filter::Bzip2)
        } else if magic.starts_with(XZ_MAGIC) {
            Err("xz")
        } else if magic.starts_with(ZSTD_MAGIC) {
            Err("zstd")
        } else {
            Ok(Filter::None)
        }
    }

    pub(crate) fn decoder<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Filter::None => Box::new(reader),
            Filter::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Filter::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
        }
    }

    /// Write `chunks` through this filter, finishing the compressed stream.
    pub(crate) fn encode<W: Write>(self, mut writer: W, chunks: &[&[u8]]) -> Result<W> {
        match self {
            Filter::None => {
                for chunk in chunks {
                    writer.write_all(chunk)?;
                }
                Ok(writer)
            }
            Filter::Gzip => {
                let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
                for chunk in chunks {
                    encoder.write_all(chunk)?;
                }
                encoder.finish()
            }
            Filter::Bzip2 => {
                let mut encoder = BzEncoder::new(writer, bzip2::Compression::default());
                for chunk in chunks {
                    encoder.write_all(chunk)?;
                }
                encoder.finish()
            }
        }
    }
}

/// `BZh`, a block size digit, then either a block or the end-of-stream marker.
fn is_bzip2(magic: &[u8]) -> bool {
    match magic.strip_prefix(BZIP2_MAGIC) {
        Some([level, rest @ ..]) if (b'1'..=b'9').contains(level) => {
            rest.starts_with(BZIP2_BLOCK_MAGIC) || rest.starts_with(BZIP2_EOS_MAGIC)
        }
        _ => false,
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Filter::None => "none",
            Filter::Gzip => "gzip",
            Filter::Bzip2 => "bzip2",
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
