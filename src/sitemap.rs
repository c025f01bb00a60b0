//! XML sitemap serialization and self-validation.
//!
//! Stage 5 of the pipeline. Takes the annotated records, keeps the included
//! ones, and renders them as sitemap-protocol documents.
//!
//! ## Output
//!
//! ```text
//! dist/
//! ├── sitemap.xml          # <urlset>, the only file for small sites
//! ├── sitemap-2.xml        # further chunks, only when a ceiling is exceeded
//! ├── sitemap-3.xml
//! └── sitemap-index.xml    # <sitemapindex> listing every chunk (chunked runs only)
//! ```
//!
//! ## Ordering
//!
//! URLs are written by descending priority, then by location, so unchanged
//! inputs give byte-identical output that diffs cleanly.
//!
//! ## Chunking
//!
//! A document holds at most `max_urls` entries and `max_bytes` bytes. When
//! the full set fits, exactly one `<urlset>` is produced and no index. When it
//! does not, entries are packed greedily in order into as many documents as
//! needed and a `<sitemapindex>` dated `today` references each of them.
//!
//! ## Self-Validation
//!
//! Every document passes [`validate_xml`] before it is accepted. A failure is
//! fatal: an inconsistent sitemap is never handed back for writing.

use crate::config::SitemapConfig;
use crate::log::RunLog;
use crate::types::{ChangeFreq, UrlRecord, ValidationResult};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::LazyLock;
use thiserror::Error;

pub const STAGE: &str = "sitemap";

pub const NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Hard ceiling of the protocol, independent of the configured limit.
pub const PROTOCOL_MAX_URLS: usize = 50_000;

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<\?xml\s+version="1\.0"\s+encoding="(?i:utf-8)"\s*\?>"#).unwrap()
});
static ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<(urlset|sitemapindex)(\s[^>]*)?>").unwrap());
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z_][\w:.-]*)([^>]*?)(/?)>").unwrap());
static LOC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<loc>([^<]*)</loc>").unwrap());
static LASTMOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<lastmod>([^<]*)</lastmod>").unwrap());
static CHANGEFREQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<changefreq>([^<]*)</changefreq>").unwrap());
static PRIORITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<priority>([^<]*)</priority>").unwrap());
static DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("no valid URLs survived filtering; refusing to write an empty sitemap")]
    NoUrls,
    #[error("{document} failed self-validation: {}", .errors.join("; "))]
    InvalidXml {
        document: String,
        errors: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    UrlSet,
    Index,
}

/// One rendered, validated XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub filename: String,
    pub kind: DocumentKind,
    pub content: String,
    /// `<url>` entries for a urlset, `<sitemap>` entries for an index.
    pub entries: usize,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapSet {
    pub sitemaps: Vec<Document>,
    pub index: Option<Document>,
}

impl SitemapSet {
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.sitemaps.iter().chain(self.index.iter())
    }

    pub fn is_chunked(&self) -> bool {
        self.index.is_some()
    }

    pub fn url_count(&self) -> usize {
        self.sitemaps.iter().map(|d| d.entries).sum()
    }
}

/// Inputs the generator needs from the run configuration.
#[derive(Debug, Clone)]
pub struct SitemapSettings {
    /// Base URL with trailing slash; chunk locations in the index hang off it.
    pub base: String,
    pub sitemap_name: String,
    pub index_name: String,
    pub max_urls: usize,
    pub max_bytes: usize,
    pub today: NaiveDate,
}

impl SitemapSettings {
    pub fn from_config(config: &SitemapConfig, today: NaiveDate) -> Self {
        Self {
            base: config.base(),
            sitemap_name: config.output.sitemap.clone(),
            index_name: config.output.index.clone(),
            max_urls: config.limits.max_urls.min(PROTOCOL_MAX_URLS),
            max_bytes: config.limits.max_bytes,
            today,
        }
    }

    /// `sitemap.xml` for the first chunk, `sitemap-N.xml` after that.
    pub fn chunk_name(&self, n: usize) -> String {
        if n == 1 {
            return self.sitemap_name.clone();
        }
        let stem = self
            .sitemap_name
            .strip_suffix(".xml")
            .unwrap_or(&self.sitemap_name);
        format!("{stem}-{n}.xml")
    }
}

/// Render the included records into one or more validated documents.
pub fn generate(
    records: &[UrlRecord],
    settings: &SitemapSettings,
    log: &mut RunLog,
) -> Result<SitemapSet, SitemapError> {
    let mut included: Vec<&UrlRecord> = records.iter().filter(|r| r.is_included()).collect();
    if included.is_empty() {
        log.error(STAGE, "zero URLs left after filtering");
        return Err(SitemapError::NoUrls);
    }
    included.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.location.cmp(&b.location))
    });

    let entries: Vec<String> = included
        .iter()
        .map(|r| render_url(r, settings.today))
        .collect();

    let chunks = chunk(&entries, settings.max_urls, settings.max_bytes, log);
    let mut sitemaps = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let document = Document {
            filename: settings.chunk_name(i + 1),
            kind: DocumentKind::UrlSet,
            content: wrap_urlset(chunk),
            entries: chunk.len(),
        };
        accept(&document, log)?;
        sitemaps.push(document);
    }

    let index = if sitemaps.len() > 1 {
        let filenames: Vec<&str> = sitemaps.iter().map(|d| d.filename.as_str()).collect();
        let document = Document {
            filename: settings.index_name.clone(),
            kind: DocumentKind::Index,
            content: render_index(&settings.base, &filenames, settings.today),
            entries: filenames.len(),
        };
        accept(&document, log)?;
        Some(document)
    } else {
        None
    };

    log.info(
        STAGE,
        format!(
            "{} URLs in {} sitemap document(s){}",
            included.len(),
            sitemaps.len(),
            if index.is_some() { " plus index" } else { "" }
        ),
    );
    Ok(SitemapSet { sitemaps, index })
}

fn accept(document: &Document, log: &mut RunLog) -> Result<(), SitemapError> {
    let result = validate_xml(&document.content);
    if !result.valid {
        for error in &result.errors {
            log.error(STAGE, format!("{}: {error}", document.filename));
        }
        return Err(SitemapError::InvalidXml {
            document: document.filename.clone(),
            errors: result.errors,
        });
    }
    Ok(())
}

/// Pack rendered entries greedily into chunks within both ceilings.
fn chunk<'a>(
    entries: &'a [String],
    max_urls: usize,
    max_bytes: usize,
    log: &mut RunLog,
) -> Vec<&'a [String]> {
    let envelope = wrap_urlset(&[]).len();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut size = envelope;

    for (i, entry) in entries.iter().enumerate() {
        let count = i - start;
        if count > 0 && (count == max_urls || size + entry.len() > max_bytes) {
            chunks.push(&entries[start..i]);
            start = i;
            size = envelope;
        }
        if envelope + entry.len() > max_bytes {
            log.warn(
                STAGE,
                format!(
                    "a single entry of {} bytes exceeds the {max_bytes}-byte document ceiling",
                    entry.len()
                ),
            );
        }
        size += entry.len();
    }
    chunks.push(&entries[start..]);
    chunks
}

/// Escape the five reserved XML characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_url(record: &UrlRecord, today: NaiveDate) -> String {
    let lastmod = record.last_modified.unwrap_or(today);
    format!(
        "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
        escape_xml(&record.location),
        lastmod.format("%Y-%m-%d"),
        record.change_frequency,
        record.priority.clamp(0.0, 1.0),
    )
}

fn wrap_urlset(entries: &[String]) -> String {
    let mut xml = format!("{XML_DECLARATION}\n<urlset xmlns=\"{NAMESPACE}\">\n");
    for entry in entries {
        xml.push_str(entry);
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Render a complete `<urlset>` for already-filtered, already-ordered records.
#[cfg(test)]
fn render_urlset(records: &[&UrlRecord], today: NaiveDate) -> String {
    let entries: Vec<String> = records.iter().map(|r| render_url(r, today)).collect();
    wrap_urlset(&entries)
}

/// Render a `<sitemapindex>` referencing each chunk under `base`.
pub fn render_index(base: &str, filenames: &[&str], today: NaiveDate) -> String {
    let mut xml = format!("{XML_DECLARATION}\n<sitemapindex xmlns=\"{NAMESPACE}\">\n");
    for filename in filenames {
        let _ = write!(
            xml,
            "  <sitemap>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n  </sitemap>\n",
            escape_xml(&format!("{base}{filename}")),
            today.format("%Y-%m-%d"),
        );
    }
    xml.push_str("</sitemapindex>\n");
    xml
}

/// Structural self-check of a rendered urlset or index document.
pub fn validate_xml(content: &str) -> ValidationResult {
    let mut errors = Vec::new();

    let body = match DECLARATION.find(content) {
        Some(m) => &content[m.end()..],
        None => {
            errors.push("missing or malformed XML declaration (version 1.0, UTF-8)".to_string());
            content
        }
    };

    match ROOT.captures(body) {
        Some(root) => {
            let attrs = root.get(2).map(|m| m.as_str()).unwrap_or("");
            if !attrs.contains(&format!("xmlns=\"{NAMESPACE}\"")) {
                errors.push(format!("root <{}> lacks the sitemap namespace", &root[1]));
            }
        }
        None => errors.push("root element must be <urlset> or <sitemapindex>".to_string()),
    }

    if let Some((pos, c)) = content
        .char_indices()
        .find(|(_, c)| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        errors.push(format!("raw control character U+{:04X} at byte {pos}", c as u32));
    }

    if body.contains('#') {
        errors.push("fragment marker '#' present in document body".to_string());
    }

    for cap in LOC.captures_iter(body) {
        let loc = &cap[1];
        if !loc.starts_with("https://") {
            errors.push(format!("non-HTTPS location: {loc}"));
        }
    }

    for cap in LASTMOD.captures_iter(body) {
        let value = &cap[1];
        if !DATE.is_match(value) || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
            errors.push(format!("lastmod '{value}' is not a YYYY-MM-DD date"));
        }
    }

    for cap in CHANGEFREQ.captures_iter(body) {
        if ChangeFreq::parse(&cap[1]).is_none() {
            errors.push(format!("changefreq '{}' is not a standard token", &cap[1]));
        }
    }

    for cap in PRIORITY.captures_iter(body) {
        match cap[1].parse::<f64>() {
            Ok(p) if (0.0..=1.0).contains(&p) => {}
            _ => errors.push(format!("priority '{}' is not within 0.0-1.0", &cap[1])),
        }
    }

    let urls = body.matches("<url>").count();
    if urls > PROTOCOL_MAX_URLS {
        errors.push(format!(
            "{urls} <url> entries exceed the {PROTOCOL_MAX_URLS} per-document limit"
        ));
    }

    errors.extend(check_balanced(body));
    ValidationResult::from_errors(errors)
}

/// Every opening tag closed in order, nothing left open.
fn check_balanced(body: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for cap in TAG.captures_iter(body) {
        let name = cap.get(2).map(|m| m.as_str()).unwrap_or("");
        let closing = !cap[1].is_empty();
        let self_closing = !cap[4].is_empty();
        if self_closing {
            continue;
        }
        if closing {
            match stack.pop() {
                Some(open) if open == name => {}
                Some(open) => return Some(format!("</{name}> closes <{open}>")),
                None => return Some(format!("</{name}> has no matching opening tag")),
            }
        } else {
            stack.push(name);
        }
    }
    stack
        .last()
        .map(|open| format!("<{open}> is never closed"))
}
