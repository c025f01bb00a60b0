//! Centralized naming rules shared by the scanner and the URL stage.
//!
//! ## Slugs
//!
//! Catalog titles become slugs by lower-casing, collapsing every run of
//! non-alphanumeric characters to a single hyphen, and trimming hyphens from
//! both ends:
//! - `"Llama 2 7B Chat"` → `llama-2-7b-chat`
//! - `"  Mistral--7B (v0.2) "` → `mistral-7b-v0-2`
//! - `"!!!"` → `""` (empty, the caller skips it)
//!
//! ## Page paths
//!
//! The rendered page for an item lives at `<items_dir>/<slug>.html`. A page
//! named `index.html` is published under its directory URL, so
//! `guides/setup/index.html` becomes `guides/setup/`.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Derive a URL-safe slug from a human-readable title.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Site-relative path of the rendered page for a catalog slug.
pub fn item_page_path(items_dir: &str, slug: &str) -> String {
    let dir = items_dir.trim_matches('/');
    if dir.is_empty() {
        format!("{slug}.html")
    } else {
        format!("{dir}/{slug}.html")
    }
}

/// Convert a filesystem path relative to the site root into a `/`-separated
/// string, regardless of platform separator.
pub fn to_relative_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// URL path under the base for a site-relative page path.
///
/// `index.html` collapses to its directory; everything else is kept verbatim.
pub fn url_path(relative_path: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((dir, "index.html")) => format!("{dir}/"),
        None if relative_path == "index.html" => String::new(),
        _ => relative_path.to_string(),
    }
}
