//! Tests for exchanging archives with the `tar` crate's own reader and builder.

use std::io::{self, Read};

use chrono::{TimeZone, Utc};
use tar::{EntryType, Header};
use tarball_kit::{Entry, Filter, TarballReader, TarballWriter};
use tempfile::TempDir;

fn scratch(name: &str) -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let archive_path = temp_dir.path().join(name);
    (temp_dir, archive_path)
}

fn regular(size: u64, mtime: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(size);
    header.set_mtime(mtime);
    header
}

fn pax_record(key: &str, value: &str) -> String {
    let body = format!(" {}={}\n", key, value);
    let mut len = body.len() + 1;
    while len.to_string().len() + body.len() != len {
        len = len.to_string().len() + body.len();
    }
    format!("{}{}", len, body)
}

/// Members as `(path, content, mtime)`. A blank mtime field does not parse.
fn read_with_tar<R: Read>(source: R) -> Vec<(String, Vec<u8>, Option<u64>)> {
    let mut archive = tar::Archive::new(source);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mtime = entry.header().mtime().ok();
            let mut content = vec![];
            entry.read_to_end(&mut content).unwrap();
            (path, content, mtime)
        })
        .collect()
}

/// Archives written here are read back by `tar::Archive`, for every filter
#[test]
fn test_tar_crate_reads_our_archives() {
    let long_path = format!("{}/leaf.txt", "branch".repeat(25));
    let modified = Utc.timestamp_opt(1_485_388_800, 0).unwrap();
    let entries = vec![
        Entry::new("sample.txt", "red fox jumps over lazy dog").with_modified(modified),
        Entry::new(long_path.clone(), vec![9u8; 1500]),
    ];

    for filter in [Filter::None, Filter::Gzip, Filter::Bzip2] {
        let (_temp_dir, archive_path) = scratch("ours.tar");
        let mut writer = TarballWriter::create_with_filter(&archive_path, filter).unwrap();
        writer.write_entries(&entries).unwrap();
        writer.finish().unwrap();

        let file = std::fs::File::open(&archive_path).unwrap();
        let members = match filter {
            Filter::None => read_with_tar(file),
            Filter::Gzip => read_with_tar(flate2::read::GzDecoder::new(file)),
            Filter::Bzip2 => read_with_tar(bzip2::read::BzDecoder::new(file)),
        };

        assert_eq!(members.len(), 2, "filter {}", filter);
        assert_eq!(members[0].0, "sample.txt");
        assert_eq!(members[0].1, b"red fox jumps over lazy dog");
        assert_eq!(members[0].2, Some(1_485_388_800));
        assert_eq!(members[1].0, long_path);
        assert_eq!(members[1].1, vec![9u8; 1500]);
        assert_eq!(members[1].2, None);
    }
}

/// Archives from `tar::Builder` are cataloged here, skipping everything but regular files
#[test]
fn test_we_read_tar_builder_archives() {
    let (_temp_dir, archive_path) = scratch("theirs.tar");
    let gnu_long = format!("{}/gnu.txt", "x".repeat(140));
    let ustar_long = format!("{}/{}/ustar.txt", "p".repeat(60), "q".repeat(60));

    {
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);

        let mut dir = Header::new_gnu();
        dir.set_entry_type(EntryType::Directory);
        dir.set_mode(0o755);
        dir.set_size(0);
        builder.append_data(&mut dir, "docs/", io::empty()).unwrap();

        let mut header = regular(5, 1_485_388_800);
        builder
            .append_data(&mut header, "docs/hello.txt", &b"hello"[..])
            .unwrap();

        let mut link = Header::new_gnu();
        link.set_entry_type(EntryType::Symlink);
        link.set_mode(0o777);
        link.set_size(0);
        link.set_link_name("docs/hello.txt").unwrap();
        builder
            .append_data(&mut link, "docs/link.txt", io::empty())
            .unwrap();

        let mut header = regular(3, 0);
        builder
            .append_data(&mut header, &gnu_long, &b"gnu"[..])
            .unwrap();

        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(5);
        header.set_mtime(0);
        builder
            .append_data(&mut header, &ustar_long, &b"ustar"[..])
            .unwrap();

        builder.finish().unwrap();
    }

    let reader = TarballReader::new(&archive_path);
    let items = reader.catalog().unwrap();
    let paths: Vec<_> = items.iter().map(|x| x.path()).collect();
    assert_eq!(paths, ["docs/hello.txt", gnu_long.as_str(), ustar_long.as_str()]);

    assert_eq!(
        items[0].modified(),
        Some(&Utc.timestamp_opt(1_485_388_800, 0).unwrap())
    );
    assert_eq!(reader.read_item(&items[0]).unwrap(), b"hello");
    assert_eq!(reader.read_path(&gnu_long).unwrap(), b"gnu");
    assert_eq!(reader.read_item(&items[2]).unwrap(), b"ustar");
}

/// PAX extended headers supply the path and times of the member that follows
#[test]
fn test_pax_headers() {
    let (_temp_dir, archive_path) = scratch("pax.tar");
    let pax_path = format!("{}/pax.txt", "z".repeat(200));

    {
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);

        let global = pax_record("comment", "made by a test");
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::XGlobalHeader);
        header.set_path("pax_global_header").unwrap();
        header.set_size(global.len() as u64);
        header.set_cksum();
        builder.append(&header, global.as_bytes()).unwrap();

        let records = format!(
            "{}{}{}",
            pax_record("path", &pax_path),
            pax_record("mtime", "1485388800.25"),
            pax_record("LIBARCHIVE.creationtime", "1485302400"),
        );
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::XHeader);
        header.set_path("PaxHeaders/pax.txt").unwrap();
        header.set_size(records.len() as u64);
        header.set_cksum();
        builder.append(&header, records.as_bytes()).unwrap();

        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_path("short-name.txt").unwrap();
        header.set_mode(0o644);
        header.set_size(3);
        header.set_mtime(5);
        header.set_cksum();
        builder.append(&header, &b"pax"[..]).unwrap();

        builder.finish().unwrap();
    }

    let reader = TarballReader::new(&archive_path);
    let items = reader.catalog().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), pax_path);
    assert_eq!(
        items[0].modified(),
        Some(&Utc.timestamp_opt(1_485_388_800, 250_000_000).unwrap())
    );
    assert_eq!(
        items[0].created(),
        Some(&Utc.timestamp_opt(1_485_302_400, 0).unwrap())
    );
    assert_eq!(reader.read_path(&pax_path).unwrap(), b"pax");
}

/// Appending to a `tar::Builder` archive replaces its padded trailer
#[test]
fn test_append_to_tar_builder_archive() {
    let (_temp_dir, archive_path) = scratch("theirs-append.tar");

    {
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = regular(6, 0);
        builder
            .append_data(&mut header, "theirs.txt", &b"theirs"[..])
            .unwrap();
        builder.finish().unwrap();
    }

    let mut writer = TarballWriter::append(&archive_path).unwrap();
    writer.write_data(&b"ours"[..], "ours.txt").unwrap();
    writer.finish().unwrap();

    let file = std::fs::File::open(&archive_path).unwrap();
    let members = read_with_tar(file);
    let paths: Vec<_> = members.iter().map(|m| m.0.as_str()).collect();
    assert_eq!(paths, ["theirs.txt", "ours.txt"]);
    assert_eq!(members[1].1, b"ours");
}

/// A PAX `size` record decides how long the member body is
#[test]
fn test_pax_size_record() {
    let (_temp_dir, archive_path) = scratch("pax-size.tar");

    {
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);

        let records = pax_record("size", "700");
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::XHeader);
        header.set_path("PaxHeaders/sized.bin").unwrap();
        header.set_size(records.len() as u64);
        header.set_cksum();
        builder.append(&header, records.as_bytes()).unwrap();

        // The header field disagrees with the record.
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_path("sized.bin").unwrap();
        header.set_mode(0o644);
        header.set_size(0);
        header.set_mtime(0);
        header.set_cksum();
        builder.append(&header, &[4u8; 700][..]).unwrap();

        let mut header = regular(5, 0);
        builder
            .append_data(&mut header, "after.txt", &b"after"[..])
            .unwrap();

        builder.finish().unwrap();
    }

    let reader = TarballReader::new(&archive_path);
    let items = reader.catalog().unwrap();
    let paths: Vec<_> = items.iter().map(|x| x.path()).collect();
    assert_eq!(paths, ["sized.bin", "after.txt"]);
    assert_eq!(items[0].size(), 700);
    assert_eq!(reader.read_item(&items[0]).unwrap(), vec![4u8; 700]);
    assert_eq!(reader.read_path("after.txt").unwrap(), b"after");
}
