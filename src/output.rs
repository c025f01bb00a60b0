//! CLI output formatting for a sitemap run.
//!
//! Output leads with counts, then lists the entities a user may need to act
//! on: duplicate resolutions, documents, and any warnings or errors. Paths and
//! reasons appear as indented context lines under each entity.
//!
//! ```text
//! Run 2025-01-15 → https://models.example.com/
//!
//! Inventory
//!     files scanned: 3
//!     catalog entries verified: 1
//!
//! URLs
//!     candidates: 5
//!     invalid: 1
//!     duplicates: 1
//!     included: 3
//!         guide: 1
//!         home: 1
//!         item: 1
//!
//! Duplicates
//! 001 https://models.example.com/models/llama-2-7b-chat.html
//!     Kept: file (models/llama-2-7b-chat.html)
//!     Dropped: catalog (models/llama-2-7b-chat.html)
//!     Reason: file-sourced record preferred over catalog-sourced
//!
//! Documents
//! 001 sitemap.xml (3 URLs, 712 bytes)
//!
//! Warnings (1)
//!     [scan] catalog row 1 'Ghost' has no rendered page at models/ghost.html, skipping
//! ```
//!
//! Each `format_*` function returns `Vec<String>` and does no I/O; the
//! `print_*` wrappers write to stdout.

use crate::dedup::{Contender, Resolution};
use crate::report::{DocumentReport, RunReport, RunStatus};
use crate::sitemap::DocumentKind;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn count_line(depth: usize, label: &str, value: usize) -> String {
    format!("{}{}: {}", indent(depth), label, value)
}

/// `file (models/a.html)`, or just the source when there is no origin.
fn contender_line(contender: &Contender) -> String {
    if contender.origin.is_empty() {
        contender.source.to_string()
    } else {
        format!("{} ({})", contender.source, contender.origin)
    }
}

fn document_line(index: usize, document: &DocumentReport) -> String {
    let unit = match document.kind {
        DocumentKind::UrlSet => "URLs",
        DocumentKind::Index => "sitemaps",
    };
    format!(
        "{} {} ({} {}, {} bytes)",
        format_index(index),
        document.filename,
        document.entries,
        unit,
        document.bytes
    )
}

// ============================================================================
// Sections
// ============================================================================

fn format_duplicates(resolutions: &[Resolution]) -> Vec<String> {
    let mut lines = vec!["Duplicates".to_string()];
    for (i, resolution) in resolutions.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), resolution.location));
        lines.push(format!("{}Kept: {}", indent(1), contender_line(&resolution.winner)));
        for loser in &resolution.losers {
            lines.push(format!("{}Dropped: {}", indent(1), contender_line(loser)));
        }
        lines.push(format!("{}Reason: {}", indent(1), resolution.reason));
    }
    lines
}

fn format_messages(title: &str, messages: &[String]) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", title, messages.len())];
    lines.extend(messages.iter().map(|m| format!("{}{}", indent(1), m)));
    lines
}

// ============================================================================
// Run output
// ============================================================================

/// Format the summary of a finished or failed run.
pub fn format_run_output(report: &RunReport) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![format!("Run {} → {}", report.run_date, report.base_url)];

    lines.push(String::new());
    lines.push("Inventory".to_string());
    lines.push(count_line(1, "files scanned", summary.files_scanned));
    lines.push(count_line(
        1,
        "catalog entries verified",
        summary.catalog_entries_verified,
    ));

    lines.push(String::new());
    lines.push("URLs".to_string());
    lines.push(count_line(1, "candidates", summary.candidate_urls));
    lines.push(count_line(1, "invalid", summary.invalid_urls));
    lines.push(count_line(1, "duplicates", summary.duplicate_urls));
    lines.push(count_line(1, "included", summary.included_urls));
    for (content_type, count) in &report.per_type {
        lines.push(count_line(2, content_type, *count));
    }

    if !report.duplicates.is_empty() {
        lines.push(String::new());
        lines.extend(format_duplicates(&report.duplicates));
    }

    if !report.documents.is_empty() {
        lines.push(String::new());
        lines.push("Documents".to_string());
        for (i, document) in report.documents.iter().enumerate() {
            lines.push(document_line(i + 1, document));
        }
    }

    if !report.warnings.is_empty() {
        lines.push(String::new());
        lines.extend(format_messages("Warnings", &report.warnings));
    }
    if !report.errors.is_empty() {
        lines.push(String::new());
        lines.extend(format_messages("Errors", &report.errors));
    }

    if report.status == RunStatus::Failed {
        lines.push(String::new());
        lines.push(format!(
            "Run failed: {}",
            report.failure.as_deref().unwrap_or("unknown error")
        ));
    }
    lines
}

pub fn print_run_output(report: &RunReport) {
    for line in format_run_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
