use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use tarball_kit::{Item, TarballReader};

use crate::error::{Error, Result};

#[inline(always)]
fn time(time: Option<&DateTime<Utc>>) -> String {
    time.map(|x| x.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".into())
}

fn json(items: &[Item]) -> serde_json::Value {
    items
        .iter()
        .map(|item| {
            serde_json::json!({
                "path": item.path(),
                "size": item.size(),
                "compressed": item.is_compressed(),
                "offset": item.range().map(|r| r.start),
                "created": item.created().map(|x| x.to_rfc3339_opts(SecondsFormat::Secs, true)),
                "modified": item.modified().map(|x| x.to_rfc3339_opts(SecondsFormat::Secs, true)),
            })
        })
        .collect()
}

pub fn run(path: PathBuf, as_json: bool, verbose: bool) -> Result<()> {
    use humansize::{file_size_opts as options, FileSize};

    let reader = TarballReader::new(&path);
    let items = reader.catalog().map_err(|source| Error::ReadArchive {
        path: path.clone(),
        source,
    })?;

    if as_json {
        println!("{}", json(&items));
        return Ok(());
    }

    println!("Compressed  Length         Modified               Path");
    println!("----------  -------------  ---------------------  --------");
    for item in items.iter() {
        let length = item
            .size()
            .file_size(options::BINARY)
            .unwrap_or_else(|_| item.size().to_string());

        println!(
            "{:10}  {:>12}   {:<20}   {}",
            if item.is_compressed() { "yes" } else { "no" },
            length,
            time(item.modified()),
            item.path(),
        );
    }

    if verbose {
        println!("\n{} items", items.len());
    }

    Ok(())
}
