//! The 512-byte block layer: reading and checking headers, decoding GNU/PAX name and time
//! extensions, and encoding the headers we write ourselves.

use std::fmt::Write;
use std::io::{self, Read};

use chrono::{DateTime, TimeZone, Utc};
use tar::{EntryType, Header, PaxExtensions};

pub(crate) const BLOCK_SIZE: u64 = 512;

/// Two zero blocks mark the end of a TAR archive.
pub(crate) const TRAILER: [u8; 1024] = [0; 1024];

const NAME_FIELD_LEN: usize = 100;
const GNU_LONGNAME_PATH: &[u8] = b"././@LongLink";
const CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

#[inline(always)]
pub(crate) fn padding(size: u64) -> u64 {
    (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE
}

#[inline(always)]
pub(crate) fn stored_size(size: u64) -> u64 {
    size + padding(size)
}

pub(crate) fn malformed<E>(err: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, err)
}

pub(crate) fn truncated(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("archive is truncated inside {}", what),
    )
}

/// Fill `buf` from `reader`, returning how many bytes arrived before end of stream.
pub(crate) fn read_block<R: Read>(reader: &mut R, buf: &mut [u8; 512]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Unsigned header sum with the checksum field itself counted as spaces.
pub(crate) fn checksum(bytes: &[u8; 512]) -> u32 {
    bytes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if CHECKSUM_FIELD.contains(&i) {
                u32::from(b' ')
            } else {
                u32::from(*b)
            }
        })
        .sum()
}

pub(crate) fn verify_checksum(header: &Header) -> io::Result<()> {
    let stored = header.cksum()?;
    let computed = checksum(header.as_bytes());
    if stored == computed {
        Ok(())
    } else {
        Err(malformed(format!(
            "header checksum mismatch (stored {:o}, computed {:o})",
            stored, computed
        )))
    }
}

pub(crate) fn timestamp(secs: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(i64::try_from(secs).ok()?, 0).single()
}

/// PAX times are decimal seconds with an optional fraction, e.g. `1485345600.25`.
fn pax_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let (secs, fraction) = match value.split_once('.') {
        Some((secs, fraction)) => (secs, fraction),
        None => (value, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    let nanos = if fraction.is_empty() || secs < 0 {
        0
    } else {
        let digits: String = fraction.chars().take(9).collect();
        format!("{:0<9}", digits).parse().ok()?
    };
    Utc.timestamp_opt(secs, nanos).single()
}

#[inline(always)]
fn epoch_secs(time: &DateTime<Utc>) -> u64 {
    u64::try_from(time.timestamp()).unwrap_or(0)
}

/// Metadata carried by GNU long-name and PAX headers for the member that follows them.
#[derive(Debug, Default)]
pub(crate) struct Extensions {
    long_name: Option<Vec<u8>>,
    pax_path: Option<Vec<u8>>,
    pax_size: Option<u64>,
    pax_modified: Option<DateTime<Utc>>,
    pax_creation: Option<DateTime<Utc>>,
    pax_ctime: Option<DateTime<Utc>>,
}

impl Extensions {
    pub(crate) fn set_long_name(&mut self, mut name: Vec<u8>) {
        while name.last() == Some(&0) {
            name.pop();
        }
        self.long_name = Some(name);
    }

    pub(crate) fn absorb_pax(&mut self, data: &[u8]) -> io::Result<()> {
        for extension in PaxExtensions::new(data) {
            let extension = extension?;
            let key = extension.key().map_err(malformed)?;
            match key {
                "path" => self.pax_path = Some(extension.value_bytes().to_vec()),
                "size" => {
                    let value = extension.value().map_err(malformed)?;
                    let size = value
                        .parse()
                        .map_err(|_| malformed(format!("invalid PAX size {:?}", value)))?;
                    self.pax_size = Some(size);
                }
                "mtime" => self.pax_modified = extension.value().ok().and_then(pax_timestamp),
                "LIBARCHIVE.creationtime" => {
                    self.pax_creation = extension.value().ok().and_then(pax_timestamp)
                }
                "ctime" => self.pax_ctime = extension.value().ok().and_then(pax_timestamp),
                _ => {}
            }
        }
        Ok(())
    }
}

/// A regular member header, with extensions applied.
#[derive(Debug)]
pub(crate) struct MemberHeader {
    pub(crate) path: String,
    pub(crate) size: u64,
    pub(crate) created: Option<DateTime<Utc>>,
    pub(crate) modified: Option<DateTime<Utc>>,
}

/// Whether this header announces member content we catalog. Old-style archives mark
/// directories as regular entries whose name ends in `/`.
pub(crate) fn is_content(header: &Header) -> bool {
    match header.entry_type() {
        EntryType::Regular | EntryType::Continuous => !header.path_bytes().ends_with(b"/"),
        _ => false,
    }
}

/// Body length of the entry `header` introduces. A PAX `size` record overrides the header
/// field, which cannot hold more than 8 GiB in octal.
pub(crate) fn entry_size(header: &Header, extensions: &Extensions) -> io::Result<u64> {
    match extensions.pax_size {
        Some(size) => Ok(size),
        None => header.entry_size(),
    }
}

/// Member names are taken as UTF-8. In a name that is not, stray bytes and `%` are
/// percent-encoded, so distinct raw names stay distinct.
pub(crate) fn decode_name(name: &[u8]) -> String {
    let mut rest = match std::str::from_utf8(name) {
        Ok(name) => return name.to_string(),
        Err(_) => name,
    };

    let mut out = String::with_capacity(name.len() + 8);
    let push_valid = |out: &mut String, valid: &str| {
        for c in valid.chars() {
            match c {
                '%' => out.push_str("%25"),
                c => out.push(c),
            }
        }
    };

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                push_valid(&mut out, valid);
                return out;
            }
            Err(err) => {
                let (valid, invalid) = rest.split_at(err.valid_up_to());
                if let Ok(valid) = std::str::from_utf8(valid) {
                    push_valid(&mut out, valid);
                }
                let bad = err.error_len().unwrap_or(invalid.len());
                for byte in &invalid[..bad] {
                    let _ = write!(out, "%{:02X}", byte);
                }
                rest = &invalid[bad..];
            }
        }
    }
}

pub(crate) fn member_header(header: &Header, extensions: Extensions) -> io::Result<MemberHeader> {
    let size = entry_size(header, &extensions)?;

    let name = match (extensions.pax_path, extensions.long_name) {
        (Some(path), _) => path,
        (None, Some(path)) => path,
        (None, None) => header.path_bytes().into_owned(),
    };
    if name.is_empty() {
        return Err(malformed("member header has an empty path"));
    }
    let path = decode_name(&name);

    let modified = extensions
        .pax_modified
        .or_else(|| header.mtime().ok().and_then(timestamp));
    let created = extensions
        .pax_creation
        .or(extensions.pax_ctime)
        .or_else(|| {
            header
                .as_gnu()
                .and_then(|gnu| gnu.ctime().ok())
                .and_then(timestamp)
        });

    Ok(MemberHeader {
        path,
        size,
        created,
        modified,
    })
}

pub(crate) fn is_valid_member_path(path: &str) -> bool {
    !path.is_empty() && !path.as_bytes().contains(&0)
}

fn set_name(header: &mut Header, name: &[u8]) {
    let len = name.len().min(NAME_FIELD_LEN);
    header.as_old_mut().name[..len].copy_from_slice(&name[..len]);
}

/// Encode the header block(s) for a regular member: a GNU long-name header when the path
/// does not fit the 100-byte name field, then the member header itself. Unset timestamps
/// leave their fields blank.
pub(crate) fn encode_header(
    path: &str,
    size: u64,
    created: Option<&DateTime<Utc>>,
    modified: Option<&DateTime<Utc>>,
) -> Vec<u8> {
    let name = path.as_bytes();
    let mut out = Vec::with_capacity(BLOCK_SIZE as usize);

    if name.len() > NAME_FIELD_LEN {
        let long_len = name.len() as u64 + 1;
        let mut long = Header::new_gnu();
        set_name(&mut long, GNU_LONGNAME_PATH);
        long.set_mode(0o644);
        long.set_uid(0);
        long.set_gid(0);
        long.set_mtime(0);
        long.set_size(long_len);
        long.set_entry_type(EntryType::GNULongName);
        long.set_cksum();

        out.extend_from_slice(long.as_bytes());
        out.extend_from_slice(name);
        out.push(0);
        out.resize(out.len() + padding(long_len) as usize, 0);
    }

    let mut header = Header::new_gnu();
    set_name(&mut header, name);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_size(size);
    header.set_entry_type(EntryType::Regular);
    if let Some(modified) = modified {
        header.set_mtime(epoch_secs(modified));
    }
    if let (Some(created), Some(gnu)) = (created, header.as_gnu_mut()) {
        gnu.set_ctime(epoch_secs(created));
    }
    header.set_cksum();

    out.extend_from_slice(header.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_of(block: &[u8]) -> &Header {
        Header::from_byte_slice(&block[..512])
    }

    #[test]
    fn padding_rounds_to_block() {
        assert_eq!(padding(0), 0);
        assert_eq!(padding(1), 511);
        assert_eq!(padding(512), 0);
        assert_eq!(padding(513), 511);
        assert_eq!(stored_size(27), 512);
        assert_eq!(stored_size(1024), 1024);
    }

    #[test]
    fn encoded_header_checksums() {
        let block = encode_header("sample.txt", 27, None, None);
        assert_eq!(block.len(), 512);

        let header = header_of(&block);
        verify_checksum(header).unwrap();
        assert_eq!(header.path_bytes().as_ref(), b"sample.txt");
        assert_eq!(header.entry_size().unwrap(), 27);
        assert!(is_content(header));
    }

    #[test]
    fn corrupted_header_fails_checksum() {
        let mut block = encode_header("sample.txt", 27, None, None);
        block[0] = b'S';
        assert!(verify_checksum(header_of(&block)).is_err());
    }

    #[test]
    fn unset_timestamps_read_back_as_none() {
        let block = encode_header("a.txt", 1, None, None);
        let member = member_header(header_of(&block), Extensions::default()).unwrap();
        assert_eq!(member.path, "a.txt");
        assert_eq!(member.created, None);
        assert_eq!(member.modified, None);
    }

    #[test]
    fn timestamps_read_back() {
        let created = Utc.timestamp_opt(1_485_302_400, 0).unwrap();
        let modified = Utc.timestamp_opt(1_485_388_800, 0).unwrap();
        let block = encode_header("a.txt", 1, Some(&created), Some(&modified));
        let member = member_header(header_of(&block), Extensions::default()).unwrap();
        assert_eq!(member.created, Some(created));
        assert_eq!(member.modified, Some(modified));
    }

    #[test]
    fn pre_epoch_times_clamp_to_epoch() {
        let before = Utc.timestamp_opt(-86_400, 0).unwrap();
        let block = encode_header("old.txt", 0, None, Some(&before));
        let member = member_header(header_of(&block), Extensions::default()).unwrap();
        assert_eq!(member.modified, timestamp(0));
    }

    #[test]
    fn long_names_use_gnu_longlink() {
        let path = format!("{}/file.txt", "nested".repeat(30));
        let blocks = encode_header(&path, 5, None, None);
        assert_eq!(blocks.len() % 512, 0);
        assert!(blocks.len() > 512);

        let long = header_of(&blocks);
        verify_checksum(long).unwrap();
        assert_eq!(long.entry_type(), EntryType::GNULongName);
        let long_len = long.entry_size().unwrap() as usize;

        let mut extensions = Extensions::default();
        extensions.set_long_name(blocks[512..512 + long_len].to_vec());

        let member_block = &blocks[blocks.len() - 512..];
        let member = member_header(header_of(member_block), extensions).unwrap();
        assert_eq!(member.path, path);
    }

    #[test]
    fn pax_records_override_header_fields() {
        let block = encode_header("short", 3, None, None);
        let mut extensions = Extensions::default();
        let record = |key: &str, value: &str| {
            let body = format!(" {}={}\n", key, value);
            let mut len = body.len() + 1;
            while len.to_string().len() + body.len() != len {
                len = len.to_string().len() + body.len();
            }
            format!("{}{}", len, body)
        };
        let data = format!(
            "{}{}{}",
            record("path", "a/much/longer/pax/path.txt"),
            record("mtime", "1485388800.5"),
            record("LIBARCHIVE.creationtime", "1485302400")
        );
        extensions.absorb_pax(data.as_bytes()).unwrap();

        let member = member_header(header_of(&block), extensions).unwrap();
        assert_eq!(member.path, "a/much/longer/pax/path.txt");
        assert_eq!(
            member.modified,
            Utc.timestamp_opt(1_485_388_800, 500_000_000).single()
        );
        assert_eq!(member.created, Utc.timestamp_opt(1_485_302_400, 0).single());
    }

    #[test]
    fn pax_size_overrides_header_size() {
        let block = encode_header("huge.bin", 0, None, None);
        let mut extensions = Extensions::default();
        extensions.absorb_pax(b"20 size=10000000000\n").unwrap();
        assert_eq!(
            entry_size(header_of(&block), &extensions).unwrap(),
            10_000_000_000
        );

        let member = member_header(header_of(&block), extensions).unwrap();
        assert_eq!(member.size, 10_000_000_000);

        let mut extensions = Extensions::default();
        assert!(extensions.absorb_pax(b"12 size=big\n").is_err());
    }

    #[test]
    fn non_utf8_names_stay_distinct() {
        assert_eq!(decode_name(b"plain/name.txt"), "plain/name.txt");
        assert_eq!(decode_name(b"100%.txt"), "100%.txt");
        assert_eq!(decode_name(b"caf\xe9.txt"), "caf%E9.txt");
        assert_eq!(decode_name(b"%E9\xff"), "%25E9%FF");
        assert_eq!(decode_name(b"\xc3"), "%C3");
        assert_ne!(decode_name(b"x\xfe"), decode_name(b"x\xff"));
    }

    #[test]
    fn pax_timestamp_parsing() {
        assert_eq!(pax_timestamp("0"), timestamp(0));
        assert_eq!(
            pax_timestamp("12.000000001"),
            Utc.timestamp_opt(12, 1).single()
        );
        assert_eq!(pax_timestamp("nope"), None);
    }

    #[test]
    fn member_path_validation() {
        assert!(is_valid_member_path("sample.txt"));
        assert!(is_valid_member_path("dir/sample.txt"));
        assert!(!is_valid_member_path(""));
        assert!(!is_valid_member_path("nul\0byte"));
    }

    #[test]
    fn read_block_reports_short_reads() {
        let mut buf = [0u8; 512];
        let data = [7u8; 100];
        assert_eq!(read_block(&mut &data[..], &mut buf).unwrap(), 100);
        assert_eq!(read_block(&mut &[][..], &mut buf).unwrap(), 0);
    }
}
