//! Shared test utilities.
//!
//! [`SiteFixture`] builds a throwaway rendered site under a temp directory:
//! pages with fixed modification dates, a catalog file, and a matching
//! [`SitemapConfig`]. Lookup helpers panic with the available values on a
//! miss so a failing assertion says what was there instead.
//!
//! ```rust
//! let site = SiteFixture::new();
//! site.page("models/llama-2-7b-chat.html", "2024-03-01");
//! site.catalog(json!([{"modelName": "Llama 2 7B Chat"}]));
//!
//! let inventory = scan(&site.config(), &mut RunLog::new());
//! ```

use crate::config::SitemapConfig;
use crate::types::{ChangeFreq, ContentType, Source, UrlRecord};
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

// =========================================================================
// Fixture setup
// =========================================================================

pub struct SiteFixture {
    tmp: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("site")).unwrap();
        Self { tmp }
    }

    /// The rendered-site root (`<tmp>/site`).
    pub fn root(&self) -> PathBuf {
        self.tmp.path().join("site")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root().join("data/catalog.json")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.tmp.path().join("dist")
    }

    /// Write a file under the site root, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write an HTML page whose mtime falls on `date` (`YYYY-MM-DD`, noon UTC).
    pub fn page(&self, relative: &str, date: &str) -> PathBuf {
        let path = self.write(relative, "<!doctype html><title>page</title>");
        set_mtime(&path, date);
        path
    }

    /// Symlink at `relative` pointing to `target`, which is resolved from the
    /// link's own directory and need not exist.
    #[cfg(unix)]
    pub fn link(&self, relative: &str, target: &str) -> PathBuf {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, &path).unwrap();
        path
    }

    pub fn catalog(&self, rows: serde_json::Value) {
        self.write("data/catalog.json", &rows.to_string());
    }

    /// Config pointing at this fixture with a fixed `today`.
    pub fn config(&self) -> SitemapConfig {
        SitemapConfig {
            base_url: "https://models.example.com".to_string(),
            site_root: self.root(),
            catalog: self.catalog_path(),
            today: Some(date("2025-01-15")),
            output: crate::config::OutputConfig {
                dir: self.output_dir(),
                ..Default::default()
            },
            ..SitemapConfig::default()
        }
    }
}

pub fn set_mtime(path: &Path, day: &str) {
    let noon = date(day).and_hms_opt(12, 0, 0).unwrap();
    let time: SystemTime = Utc.from_utc_datetime(&noon).into();
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// =========================================================================
// Record builders
// =========================================================================

/// A validated record with the item defaults; adjust fields as needed.
pub fn record(location: &str, source: Source) -> UrlRecord {
    UrlRecord {
        location: location.to_string(),
        last_modified: Some(date("2024-01-01")),
        change_frequency: ChangeFreq::Weekly,
        priority: 0.8,
        content_type: ContentType::Item,
        source,
        validated: true,
        is_duplicate: false,
        metadata: BTreeMap::new(),
    }
}

/// `count` distinct item records under `https://models.example.com/models/`.
pub fn many_records(count: usize) -> Vec<UrlRecord> {
    (0..count)
        .map(|i| {
            record(
                &format!("https://models.example.com/models/m-{i:06}.html"),
                Source::File,
            )
        })
        .collect()
}

// =========================================================================
// Lookups
// =========================================================================

/// Find a record by location. Panics if not found.
pub fn find_record<'a>(records: &'a [UrlRecord], location: &str) -> &'a UrlRecord {
    records
        .iter()
        .find(|r| r.location == location)
        .unwrap_or_else(|| {
            let locations: Vec<&str> = records.iter().map(|r| r.location.as_str()).collect();
            panic!("record '{location}' not found. Available: {locations:?}")
        })
}

/// All `<loc>` values in document order.
pub fn locs(xml: &str) -> Vec<String> {
    xml.split("<loc>")
        .skip(1)
        .filter_map(|s| s.split_once("</loc>").map(|(loc, _)| loc.to_string()))
        .collect()
}
