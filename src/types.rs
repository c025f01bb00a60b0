//! Shared types passed between pipeline stages.
//!
//! Scanning produces [`ContentInventory`] (files plus verified catalog rows),
//! the URL stage lifts those into [`UrlRecord`]s, and every later stage
//! consumes records by value and hands back annotated copies. Nothing here is
//! shared mutably between stages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Classification tag that drives SEO policy.
///
/// The known kinds are closed; anything else a config names lands in
/// [`ContentType::Other`] and gets the default policy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Home,
    Item,
    Guide,
    Category,
    Other(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Home => "home",
            ContentType::Item => "item",
            ContentType::Guide => "guide",
            ContentType::Category => "category",
            ContentType::Other(name) => name,
        }
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "home" => ContentType::Home,
            "item" => ContentType::Item,
            "guide" => ContentType::Guide,
            "category" => ContentType::Category,
            _ => ContentType::Other(value),
        }
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        ContentType::from(value.to_string())
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The seven `<changefreq>` tokens of the sitemap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub const ALL: [ChangeFreq; 7] = [
        ChangeFreq::Always,
        ChangeFreq::Hourly,
        ChangeFreq::Daily,
        ChangeFreq::Weekly,
        ChangeFreq::Monthly,
        ChangeFreq::Yearly,
        ChangeFreq::Never,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }

    pub fn parse(token: &str) -> Option<ChangeFreq> {
        Self::ALL.into_iter().find(|f| f.as_str() == token)
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// A rendered page found on disk.
    File,
    /// A catalog row whose rendered page was confirmed on disk.
    Catalog,
    /// Synthesized by the pipeline (the home page).
    Generated,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::File => "file",
            Source::Catalog => "catalog",
            Source::Generated => "generated",
        })
    }
}

/// A rendered page discovered on disk. Immutable once scanned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// File name including extension (`llama-2-7b-chat.html`).
    pub name: String,
    /// Absolute or working-directory-relative path used to stat the file.
    pub path: PathBuf,
    /// Path relative to the site root, `/`-separated.
    pub relative_path: String,
    pub exists: bool,
    pub last_modified: Option<NaiveDate>,
    pub size: u64,
}

/// One catalog row with its derived slug.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    /// Position in the catalog array, for log messages.
    pub index: usize,
    pub title: String,
    pub slug: String,
}

/// A catalog row whose expected rendered page exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedEntry {
    pub entry: CatalogEntry,
    pub file: FileRecord,
}

/// Verified content discovered by the scanner.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentInventory {
    /// Rendered files per content type, in scan order.
    pub files: BTreeMap<ContentType, Vec<FileRecord>>,
    /// Slug-deduplicated catalog rows with confirmed pages.
    pub catalog: Vec<VerifiedEntry>,
    /// The site-root `index.html`, if rendered. Only its date is used.
    pub home_page: Option<FileRecord>,
}

impl ContentInventory {
    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Candidate sitemap URL. The central record of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlRecord {
    pub location: String,
    pub last_modified: Option<NaiveDate>,
    pub change_frequency: ChangeFreq,
    pub priority: f64,
    pub content_type: ContentType,
    pub source: Source,
    pub validated: bool,
    pub is_duplicate: bool,
    /// Free-form provenance (`relative_path`, `slug`, `title`).
    pub metadata: BTreeMap<String, String>,
}

impl UrlRecord {
    /// Whether this record belongs in the final sitemap.
    pub fn is_included(&self) -> bool {
        self.validated && !self.is_duplicate
    }

    /// The path or slug this record was derived from, used as a tiebreak.
    pub fn origin_key(&self) -> &str {
        self.metadata
            .get("relative_path")
            .or_else(|| self.metadata.get("slug"))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Outcome of a structural check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}
