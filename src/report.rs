//! JSON run report.
//!
//! The orchestrator fills a [`RunReport`] stage by stage, so a run that fails
//! halfway still reports the counts it reached. The report ends with the
//! accumulated warnings, errors, and the raw log.

use crate::dedup::Resolution;
use crate::log::{LogEntry, RunLog};
use crate::sitemap::{Document, DocumentKind, SitemapSet};
use crate::types::UrlRecord;
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub files_scanned: usize,
    pub catalog_entries_verified: usize,
    pub candidate_urls: usize,
    pub invalid_urls: usize,
    pub duplicate_urls: usize,
    pub included_urls: usize,
    pub sitemap_documents: usize,
    pub chunked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationStats {
    pub urls_checked: usize,
    pub urls_valid: usize,
    pub urls_invalid: usize,
    pub documents_validated: usize,
    pub xml_valid: bool,
}

/// One written (or, for `check`, would-be-written) document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub filename: String,
    pub kind: DocumentKind,
    pub entries: usize,
    pub bytes: usize,
    pub sha256: String,
}

impl From<&Document> for DocumentReport {
    fn from(document: &Document) -> Self {
        Self {
            filename: document.filename.clone(),
            kind: document.kind,
            entries: document.entries,
            bytes: document.content.len(),
            sha256: format!("{:x}", Sha256::digest(document.content.as_bytes())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub run_date: NaiveDate,
    pub base_url: String,
    pub summary: Summary,
    /// Included URLs per content type.
    pub per_type: BTreeMap<String, usize>,
    pub duplicates: Vec<Resolution>,
    pub validation: ValidationStats,
    pub documents: Vec<DocumentReport>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub log: Vec<LogEntry>,
}

impl RunReport {
    pub fn new(base_url: &str, run_date: NaiveDate) -> Self {
        Self {
            status: RunStatus::Failed,
            failure: None,
            run_date,
            base_url: base_url.to_string(),
            summary: Summary::default(),
            per_type: BTreeMap::new(),
            duplicates: Vec::new(),
            validation: ValidationStats::default(),
            documents: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Count the records that made it into the sitemap, by content type.
    pub fn record_included(&mut self, records: &[UrlRecord]) {
        self.per_type.clear();
        for record in records.iter().filter(|r| r.is_included()) {
            *self
                .per_type
                .entry(record.content_type.to_string())
                .or_default() += 1;
        }
        self.summary.included_urls = self.per_type.values().sum();
    }

    pub fn record_documents(&mut self, set: &SitemapSet) {
        self.documents = set.documents().map(DocumentReport::from).collect();
        self.summary.sitemap_documents = set.sitemaps.len();
        self.summary.chunked = set.is_chunked();
        self.validation.documents_validated = self.documents.len();
        self.validation.xml_valid = true;
    }

    /// Close the report with the run's outcome and a copy of the log.
    pub fn finish(&mut self, log: &RunLog, failure: Option<String>) {
        self.status = if failure.is_none() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        self.failure = failure;
        self.warnings = log.warnings.clone();
        self.errors = log.errors.clone();
        self.log = log.entries.clone();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use crate::types::{ContentType, Source};

    #[test]
    fn new_report_is_failed_until_finished() {
        let report = RunReport::new("https://models.example.com", date("2025-01-15"));
        assert_eq!(report.status, RunStatus::Failed);
    }

    #[test]
    fn per_type_counts_only_included() {
        let mut report = RunReport::new("https://models.example.com", date("2025-01-15"));
        let mut records = many_records(3);
        records[0].is_duplicate = true;
        records[1].content_type = ContentType::Guide;
        let mut home = record("https://models.example.com/", Source::Generated);
        home.content_type = ContentType::Home;
        records.push(home);

        report.record_included(&records);

        assert_eq!(report.per_type["item"], 1);
        assert_eq!(report.per_type["guide"], 1);
        assert_eq!(report.per_type["home"], 1);
        assert_eq!(report.summary.included_urls, 3);
    }

    #[test]
    fn document_report_hashes_content() {
        let document = Document {
            filename: "sitemap.xml".into(),
            kind: DocumentKind::UrlSet,
            content: "abc".into(),
            entries: 0,
        };

        let report = DocumentReport::from(&document);

        assert_eq!(report.bytes, 3);
        assert_eq!(
            report.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn finish_copies_log_and_sets_status() {
        let mut log = RunLog::new();
        log.warn("scan", "missing dir");
        log.error("urls", "bad url");
        let mut report = RunReport::new("https://models.example.com", date("2025-01-15"));

        report.finish(&log, None);
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.log.len(), 2);

        report.finish(&log, Some("boom".into()));
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.failure.as_deref(), Some("boom"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = RunReport::new("https://models.example.com", date("2025-01-15"));
        report.finish(&RunLog::new(), None);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["run_date"], "2025-01-15");
        assert!(json.get("failure").is_none());
    }
}
