//! # Catalog Sitemap
//!
//! Builds a sitemaps.org XML sitemap for a statically rendered model catalog.
//! The rendered site on disk and the catalog it was rendered from are the
//! data sources; nothing is fetched over the network.
//!
//! # Architecture: Five-Stage Pipeline
//!
//! Each stage consumes the previous stage's full output:
//!
//! ```text
//! 1. Scan      site/ + catalog.json  →  ContentInventory   (verified files, rows)
//! 2. URLs      inventory             →  UrlRecord list     (absolute, https, no '#')
//! 3. Dedup     records               →  records + losers flagged
//! 4. Priority  records               →  priority, changefreq, lastmod filled
//! 5. Sitemap   included records      →  validated XML documents
//! ```
//!
//! The [`pipeline`] orchestrator runs the stages and is the only writer to
//! disk. Problems with individual files, rows, or URLs are logged to a
//! [`log::RunLog`] and skipped; only failures that make the whole output
//! untrustworthy abort the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: walks content directories, loads and verifies catalog rows |
//! | [`urls`] | Stage 2: builds candidate URLs on the base URL and validates them |
//! | [`dedup`] | Stage 3: resolves records sharing a location, keeping an audit trail |
//! | [`priority`] | Stage 4: per-type priority and change frequency, date fallback |
//! | [`sitemap`] | Stage 5: XML rendering, chunking, index, self-validation |
//! | [`pipeline`] | Orchestrator: runs the stages, writes documents and the report |
//! | [`report`] | JSON run report with counts, duplicate decisions, digests |
//! | [`config`] | `sitemap.toml` loading over stock defaults, CLI overrides, validation |
//! | [`types`] | Records shared between stages (`UrlRecord`, `ContentInventory`) |
//! | [`naming`] | Slug derivation and page path conventions |
//! | [`log`] | Per-run log accumulator mirrored to `tracing` |
//! | [`output`] | CLI output formatting of a run summary |
//!
//! # Design Decisions
//!
//! ## Records Flow by Value
//!
//! Stages take records by value and return new ones. Deduplication flags
//! losers with `is_duplicate` instead of dropping them, so the report can
//! explain every decision; [`types::UrlRecord::is_included`] is the single
//! predicate for sitemap membership.
//!
//! ## Deterministic Output
//!
//! URLs are ordered by descending priority, then location. Duplicate
//! resolution never depends on input order beyond a final "first produced"
//! tiebreak. With a fixed run date the same inputs give byte-identical
//! documents, which the report records as SHA-256 digests.
//!
//! ## Validate Before Writing
//!
//! Every document is checked by [`sitemap::validate_xml`] before anything
//! touches the output directory. Documents are staged as hidden temp files and
//! renamed into place once all of them are written, so a run that cannot
//! produce or write a valid sitemap leaves the previous one in place and
//! writes a failed report instead.

pub mod config;
pub mod dedup;
pub mod log;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod priority;
pub mod report;
pub mod scan;
pub mod sitemap;
pub mod types;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_helpers;
