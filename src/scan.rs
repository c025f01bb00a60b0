//! Filesystem and catalog scanning.
//!
//! Stage 1 of the pipeline. Reads the rendered site and the JSON catalog into
//! a verified [`ContentInventory`].
//!
//! ## Directory Structure
//!
//! ```text
//! site/                            # site_root
//! ├── index.html                   # Home page (synthesized, never scanned)
//! ├── models/                      # kind = item
//! │   ├── llama-2-7b-chat.html
//! │   └── mistral-7b-instruct.html
//! ├── guides/                      # kind = guide
//! │   ├── quantization.html
//! │   └── setup/
//! │       └── index.html           # → guides/setup/
//! └── categories/                  # kind = category
//!     └── chat.html
//! data/catalog.json                # [{"modelName": "Llama 2 7B Chat", ...}, ...]
//! ```
//!
//! ## Failure Isolation
//!
//! Nothing in this stage aborts the run:
//! - A missing content directory is a warning; it contributes zero records.
//! - A file that cannot be stat'ed, such as a dangling symlink, is an error
//!   for that file only.
//! - A missing or malformed catalog is an error; the run continues from the
//!   scanned files alone.
//! - A catalog row with no title, an empty slug, or a slug already seen is a
//!   warning and skipped (first occurrence wins).
//! - A catalog row whose rendered page is absent is a warning and dropped.
//!   The catalog is a hint; only a page on disk makes a row real.

use crate::config::{ContentDir, SitemapConfig};
use crate::log::RunLog;
use crate::naming;
use crate::types::{CatalogEntry, ContentInventory, ContentType, FileRecord, VerifiedEntry};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

pub const STAGE: &str = "scan";

/// Catalog keys tried in order for a row's title.
const TITLE_KEYS: &[&str] = &["modelName", "title", "name"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog root must be a JSON array, found {0}")]
    NotAnArray(&'static str),
}

/// Scan every configured content directory and the catalog.
pub fn scan(config: &SitemapConfig, log: &mut RunLog) -> ContentInventory {
    let files = scan_directories(&config.site_root, &config.content, &config.extensions, log);
    let catalog = scan_catalog(&config.catalog, &config.site_root, &config.items_dir, log);

    let home_page = stat_file(&config.site_root.join("index.html"), &config.site_root).ok();

    let inventory = ContentInventory {
        files,
        catalog,
        home_page,
    };
    log.info(
        STAGE,
        format!(
            "inventory: {} files across {} content types, {} verified catalog entries",
            inventory.file_count(),
            inventory.files.len(),
            inventory.catalog.len()
        ),
    );
    inventory
}

/// Collect page files from each content directory, grouped by content type.
///
/// Directories are walked recursively in file-name order; hidden entries are
/// skipped and only files with a configured extension are kept. Symlinks are
/// followed, so a link whose target is missing is logged as an error.
pub fn scan_directories(
    site_root: &Path,
    dirs: &[ContentDir],
    extensions: &[String],
    log: &mut RunLog,
) -> BTreeMap<ContentType, Vec<FileRecord>> {
    let mut files: BTreeMap<ContentType, Vec<FileRecord>> = BTreeMap::new();

    for content_dir in dirs {
        let dir = site_root.join(&content_dir.dir);
        if !dir.is_dir() {
            log.warn(
                STAGE,
                format!(
                    "content directory not found, skipping: {} ({})",
                    dir.display(),
                    content_dir.kind
                ),
            );
            continue;
        }

        let records = files.entry(content_dir.kind.clone()).or_default();
        let before = records.len();

        let walker = WalkDir::new(&dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log.error(STAGE, format!("cannot read entry in {}: {e}", dir.display()));
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_page_extension(entry.path(), extensions) {
                continue;
            }
            match stat_file(entry.path(), site_root) {
                Ok(record) if record.relative_path == "index.html" => {}
                Ok(record) => records.push(record),
                Err(e) => log.error(
                    STAGE,
                    format!("cannot stat {}: {e}", entry.path().display()),
                ),
            }
        }

        log.info(
            STAGE,
            format!(
                "{}: {} {} pages",
                content_dir.dir,
                records.len() - before,
                content_dir.kind
            ),
        );
    }

    files
}

/// Read the catalog and keep the rows whose rendered page exists.
pub fn scan_catalog(
    path: &Path,
    site_root: &Path,
    items_dir: &str,
    log: &mut RunLog,
) -> Vec<VerifiedEntry> {
    let rows = match read_catalog(path) {
        Ok(rows) => rows,
        Err(e) => {
            log.error(
                STAGE,
                format!(
                    "catalog unavailable ({}): {e}; continuing with scanned files only",
                    path.display()
                ),
            );
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut verified = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let Some(title) = entry_title(row) else {
            log.warn(STAGE, format!("catalog row {index} has no title, skipping"));
            continue;
        };

        let slug = naming::slugify(&title);
        if slug.is_empty() {
            log.warn(
                STAGE,
                format!("catalog row {index} '{title}' derives an empty slug, skipping"),
            );
            continue;
        }
        if !seen.insert(slug.clone()) {
            log.warn(
                STAGE,
                format!(
                    "catalog row {index} '{title}' duplicates slug '{slug}', keeping first occurrence"
                ),
            );
            continue;
        }

        let relative = naming::item_page_path(items_dir, &slug);
        let page = site_root.join(&relative);
        if !page.is_file() {
            log.warn(
                STAGE,
                format!("catalog row {index} '{title}' has no rendered page at {relative}, skipping"),
            );
            continue;
        }

        match stat_file(&page, site_root) {
            Ok(file) => verified.push(VerifiedEntry {
                entry: CatalogEntry { index, title, slug },
                file,
            }),
            Err(e) => log.error(STAGE, format!("cannot stat {}: {e}", page.display())),
        }
    }

    log.info(
        STAGE,
        format!(
            "catalog: {} rows, {} verified against rendered pages",
            rows.len(),
            verified.len()
        ),
    );
    verified
}

/// Stat a page and describe it relative to the site root.
pub fn stat_file(path: &Path, site_root: &Path) -> std::io::Result<FileRecord> {
    let metadata = fs::metadata(path)?;
    let last_modified = metadata
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).date_naive());
    let relative = path.strip_prefix(site_root).unwrap_or(path);

    Ok(FileRecord {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        relative_path: naming::to_relative_string(relative),
        exists: true,
        last_modified,
        size: metadata.len(),
    })
}

fn read_catalog(path: &Path) -> Result<Vec<Value>, ScanError> {
    let content = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Array(rows) => Ok(rows),
        Value::Object(_) => Err(ScanError::NotAnArray("an object")),
        Value::String(_) => Err(ScanError::NotAnArray("a string")),
        Value::Number(_) => Err(ScanError::NotAnArray("a number")),
        Value::Bool(_) => Err(ScanError::NotAnArray("a boolean")),
        Value::Null => Err(ScanError::NotAnArray("null")),
    }
}

/// First non-blank title among [`TITLE_KEYS`].
fn entry_title(row: &Value) -> Option<String> {
    let object = row.as_object()?;
    TITLE_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn has_page_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|e| {
            let ext = e.to_string_lossy();
            extensions.iter().any(|x| x.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}
