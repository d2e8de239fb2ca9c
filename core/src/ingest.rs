//! Page records as delivered by producers, and readers for JSON / JSONL
//! sources. Records that fail to decode are dropped with a warning and never
//! reach the index.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One crawled page. Field names are matched in lowercase and in the
/// capitalized form older producers emit (`ID`, `URL`, `Title`, `Body`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    #[serde(alias = "ID", alias = "Id")]
    pub id: String,
    #[serde(default, alias = "URL", alias = "Url")]
    pub url: String,
    #[serde(default, alias = "Title")]
    pub title: String,
    #[serde(default, alias = "Body")]
    pub body: String,
}

/// One page per non-blank line.
pub fn parse_jsonl<R: BufRead>(reader: R) -> Result<Vec<Page>> {
    let mut pages = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Page>(&line) {
            Ok(page) => pages.push(page),
            Err(err) => tracing::warn!(line = lineno + 1, %err, "dropping undecodable page"),
        }
    }
    Ok(pages)
}

/// A JSON array of pages or a single page object.
pub fn parse_json<R: Read>(reader: R) -> Result<Vec<Page>> {
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => {
            tracing::warn!("ignoring JSON document that is neither an array nor an object");
            vec![]
        }
    };
    let mut pages = Vec::with_capacity(values.len());
    for (i, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<Page>(v) {
            Ok(page) => pages.push(page),
            Err(err) => tracing::warn!(index = i, %err, "dropping undecodable page"),
        }
    }
    Ok(pages)
}

/// Pages from a `.json`/`.jsonl` file, or from every such file under a
/// directory.
pub fn load_pages(path: &Path) -> Result<Vec<Page>> {
    let files = if path.is_dir() { collect_page_files(path) } else { vec![path.to_path_buf()] };

    let mut pages = Vec::new();
    for file in files {
        let reader = BufReader::new(File::open(&file)?);
        let mut loaded = match page_file_kind(&file) {
            Some(PageFile::Json) => parse_json(reader)?,
            _ => parse_jsonl(reader)?,
        };
        tracing::info!(file = %file.display(), pages = loaded.len(), "loaded pages");
        pages.append(&mut loaded);
    }
    Ok(pages)
}

/// Every `.json`/`.jsonl` file under `dir`, sorted. Entries the walk cannot
/// read are logged and skipped.
fn collect_page_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        match entry {
            Ok(entry) => {
                let p = entry.path();
                if p.is_file() && page_file_kind(p).is_some() {
                    files.push(p.to_path_buf());
                }
            }
            Err(err) => tracing::warn!(%err, "skipping unreadable directory entry"),
        }
    }
    files.sort();
    files
}

enum PageFile {
    Json,
    Jsonl,
}

fn page_file_kind(p: &Path) -> Option<PageFile> {
    match p.extension().and_then(|s| s.to_str()) {
        Some("json") => Some(PageFile::Json),
        Some("jsonl") => Some(PageFile::Jsonl),
        _ => None,
    }
}
