//! Run configuration.
//!
//! Handles loading, validating, and merging `sitemap.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top, so a config
//! file only needs the keys it wants to change. Command-line flags are applied
//! last via [`Overrides`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! base_url = "https://example.com"  # Absolute HTTPS origin of the published site
//! site_root = "site"                # Directory holding the rendered pages
//! catalog = "data/catalog.json"     # JSON array of catalog items
//! items_dir = "models"              # Item pages live at <items_dir>/<slug>.html
//! extensions = ["html"]             # File extensions counted as pages
//! # today = "2024-03-01"            # Fixed date for fallbacks (default: system date)
//!
//! [[content]]
//! dir = "models"                    # Relative to site_root
//! kind = "item"                     # home | item | guide | category | <other>
//!
//! [[content]]
//! dir = "guides"
//! kind = "guide"
//!
//! [[content]]
//! dir = "categories"
//! kind = "category"
//!
//! [output]
//! dir = "dist"
//! sitemap = "sitemap.xml"
//! index = "sitemap-index.xml"
//! report = "sitemap-report.json"
//!
//! [limits]
//! max_urls = 50000                  # Per sitemap document
//! max_bytes = 52428800              # Per sitemap document (50 MiB)
//! ```
//!
//! Unknown keys are rejected to catch typos early. A `[[content]]` list in the
//! user file replaces the default list entirely.

use crate::types::ContentType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Sitemap run configuration loaded from `sitemap.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    /// Absolute HTTPS origin every location is built on.
    pub base_url: String,
    /// Directory holding the rendered site.
    pub site_root: PathBuf,
    /// JSON catalog path.
    pub catalog: PathBuf,
    /// Directory (under `site_root`) where catalog item pages are rendered.
    pub items_dir: String,
    /// File extensions that count as pages.
    pub extensions: Vec<String>,
    /// Content directories to scan, each tagged with its content type.
    pub content: Vec<ContentDir>,
    pub output: OutputConfig,
    pub limits: LimitsConfig,
    /// Fixed "current date" for fallbacks and index dates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://example.com".to_string(),
            site_root: PathBuf::from("site"),
            catalog: PathBuf::from("data/catalog.json"),
            items_dir: "models".to_string(),
            extensions: vec!["html".to_string()],
            content: vec![
                ContentDir::new("models", ContentType::Item),
                ContentDir::new("guides", ContentType::Guide),
                ContentDir::new("categories", ContentType::Category),
            ],
            output: OutputConfig::default(),
            limits: LimitsConfig::default(),
            today: None,
        }
    }
}

/// A content directory and the type its pages carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentDir {
    /// Directory relative to `site_root`.
    pub dir: String,
    pub kind: ContentType,
}

impl ContentDir {
    pub fn new(dir: &str, kind: ContentType) -> Self {
        Self {
            dir: dir.to_string(),
            kind,
        }
    }
}

/// Output file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// First (or only) sitemap document. Further chunks are `<stem>-N.xml`.
    pub sitemap: String,
    /// Index document, written only when the sitemap is chunked.
    pub index: String,
    pub report: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dist"),
            sitemap: "sitemap.xml".to_string(),
            index: "sitemap-index.xml".to_string(),
            report: "sitemap-report.json".to_string(),
        }
    }
}

/// Per-document ceilings of the sitemap protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_urls: usize,
    pub max_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_urls: 50_000,
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

impl SitemapConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("base_url '{}' is not a URL: {e}", self.base_url))
        })?;
        if base.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "base_url must use https, got '{}'",
                self.base_url
            )));
        }
        if self.base_url.contains('#') {
            return Err(ConfigError::Validation(
                "base_url must not contain a fragment".into(),
            ));
        }
        if self.limits.max_urls == 0 || self.limits.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_urls and limits.max_bytes must be non-zero".into(),
            ));
        }
        for (key, name) in [
            ("output.sitemap", &self.output.sitemap),
            ("output.index", &self.output.index),
        ] {
            if !name.ends_with(".xml") || name.len() <= ".xml".len() {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a .xml file name, got '{name}'"
                )));
            }
        }
        if !self.output.report.ends_with(".json") {
            return Err(ConfigError::Validation(format!(
                "output.report must be a .json file name, got '{}'",
                self.output.report
            )));
        }
        self.validate_output_names()?;
        for content_dir in &self.content {
            check_site_relative("content dir", &content_dir.dir)?;
        }
        check_site_relative("items_dir", &self.items_dir)?;
        if self.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Every output document needs its own file. The index must also stay
    /// clear of the chunk names `<stem>-N.xml` derived from `output.sitemap`.
    fn validate_output_names(&self) -> Result<(), ConfigError> {
        let output = &self.output;
        for (a, b) in [
            (("output.index", &output.index), ("output.sitemap", &output.sitemap)),
            (("output.report", &output.report), ("output.sitemap", &output.sitemap)),
            (("output.report", &output.report), ("output.index", &output.index)),
        ] {
            if a.1 == b.1 {
                return Err(ConfigError::Validation(format!(
                    "{} and {} must differ, both are '{}'",
                    a.0, b.0, a.1
                )));
            }
        }

        let stem = output.sitemap.strip_suffix(".xml").unwrap_or(&output.sitemap);
        let chunk_number = output
            .index
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.strip_suffix(".xml"));
        if chunk_number.is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit())) {
            return Err(ConfigError::Validation(format!(
                "output.index '{}' would be overwritten by a sitemap chunk",
                output.index
            )));
        }
        Ok(())
    }

    /// Base URL with exactly one trailing slash, ready for joining.
    pub fn base(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output.dir.join(name)
    }
}

/// Reject directories that would leave `site_root` once joined onto it.
fn check_site_relative(key: &str, dir: &str) -> Result<(), ConfigError> {
    let escapes = Path::new(dir).components().any(|c| {
        matches!(
            c,
            Component::RootDir | Component::Prefix(_) | Component::ParentDir
        )
    });
    if escapes {
        return Err(ConfigError::Validation(format!(
            "{key} '{dir}' must be a relative path inside site_root"
        )));
    }
    Ok(())
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub site_root: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub base_url: Option<String>,
    pub today: Option<NaiveDate>,
}

impl Overrides {
    pub fn apply(self, mut config: SitemapConfig) -> SitemapConfig {
        if let Some(site_root) = self.site_root {
            config.site_root = site_root;
        }
        if let Some(catalog) = self.catalog {
            config.catalog = catalog;
        }
        if let Some(dir) = self.output_dir {
            config.output.dir = dir;
        }
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if self.today.is_some() {
            config.today = self.today;
        }
        config
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SitemapConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load `path` over stock defaults, apply overrides, and validate.
pub fn load_config(path: &Path, overrides: Overrides) -> Result<SitemapConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: SitemapConfig = merged.try_into()?;
    let config = overrides.apply(config);
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `sitemap.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Catalog Sitemap Configuration
# =============================
# All settings are optional. Values shown below are the defaults.
# Relative paths resolve against the working directory.
# Unknown keys will cause an error.

# Absolute HTTPS origin of the published site. Every <loc> is built on it.
base_url = "https://example.com"

# Directory holding the rendered pages (output of the page renderer).
site_root = "site"

# JSON array of catalog items. Each row needs a title: "modelName",
# "title" or "name" (first present wins). Other fields are ignored.
catalog = "data/catalog.json"

# Catalog item pages are expected at <site_root>/<items_dir>/<slug>.html.
items_dir = "models"

# File extensions counted as pages when scanning content directories.
extensions = ["html"]

# Fixed "current date" used when a page has no other date and for the
# index <lastmod>. Set it to make repeated runs byte-identical.
# today = "2024-03-01"

# ---------------------------------------------------------------------------
# Content directories (relative to site_root)
# ---------------------------------------------------------------------------
# kind drives priority/changefreq:
#   home 1.0 daily | item 0.8 weekly | category 0.7 monthly
#   guide 0.6 monthly | anything else 0.5 monthly
# A missing directory is a warning, not an error.

[[content]]
dir = "models"
kind = "item"

[[content]]
dir = "guides"
kind = "guide"

[[content]]
dir = "categories"
kind = "category"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
dir = "dist"
sitemap = "sitemap.xml"
# Written only when the URL set is split into several documents.
index = "sitemap-index.xml"
report = "sitemap-report.json"

# ---------------------------------------------------------------------------
# Per-document ceilings (sitemap protocol limits)
# ---------------------------------------------------------------------------
[limits]
max_urls = 50000
max_bytes = 52428800
"##
}
