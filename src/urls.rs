//! Candidate URL generation and syntactic validation.
//!
//! Stage 2 of the pipeline. Lifts scanned files and verified catalog rows
//! into [`UrlRecord`]s on the configured base URL, then validates each
//! location. A location is valid iff it parses as an absolute URL, its scheme
//! is exactly `https`, and the string contains no `#`. Invalid records are
//! logged one by one and never reach later stages.

use crate::log::RunLog;
use crate::naming;
use crate::priority::policy_for;
use crate::types::{
    ContentInventory, ContentType, FileRecord, Source, UrlRecord, ValidationResult, VerifiedEntry,
};
use std::collections::BTreeMap;
use url::Url;

pub const STAGE: &str = "urls";

/// Records split by [`validate_all`].
#[derive(Debug, Default)]
pub struct Validated {
    pub valid: Vec<UrlRecord>,
    pub invalid: Vec<UrlRecord>,
}

impl Validated {
    pub fn checked(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }

    /// Append another batch, keeping production order.
    pub fn merge(&mut self, other: Validated) {
        self.valid.extend(other.valid);
        self.invalid.extend(other.invalid);
    }
}

/// One catalog-sourced item record per verified entry.
pub fn generate_from_catalog(entries: &[VerifiedEntry], base: &Url, log: &mut RunLog) -> Validated {
    let records = entries
        .iter()
        .filter_map(|verified| {
            let location = location_for(base, &verified.file.relative_path, log)?;
            let mut record = candidate(location, ContentType::Item, Source::Catalog, &verified.file);
            record
                .metadata
                .insert("slug".to_string(), verified.entry.slug.clone());
            record
                .metadata
                .insert("title".to_string(), verified.entry.title.clone());
            Some(record)
        })
        .collect();

    let validated = validate_all(records, log);
    log.info(
        STAGE,
        format!(
            "catalog: {} candidate URLs, {} valid",
            validated.checked(),
            validated.valid.len()
        ),
    );
    validated
}

/// One file-sourced record per scanned page, plus the synthesized home page.
pub fn generate_from_files(inventory: &ContentInventory, base: &Url, log: &mut RunLog) -> Validated {
    let mut validated = Validated::default();

    for (content_type, files) in &inventory.files {
        let records = files
            .iter()
            .filter_map(|file| {
                let location = location_for(base, &file.relative_path, log)?;
                Some(candidate(location, content_type.clone(), Source::File, file))
            })
            .collect();
        let part = validate_all(records, log);
        log.info(
            STAGE,
            format!(
                "{content_type}: {} candidate URLs, {} valid",
                part.checked(),
                part.valid.len()
            ),
        );
        validated.merge(part);
    }

    validated.merge(validate_all(vec![home_record(base, inventory)], log));
    validated
}

/// The home page record. Always generated, even from an empty inventory.
pub fn home_record(base: &Url, inventory: &ContentInventory) -> UrlRecord {
    let policy = policy_for(&ContentType::Home);
    let mut metadata = BTreeMap::new();
    if let Some(page) = &inventory.home_page {
        metadata.insert("relative_path".to_string(), page.relative_path.clone());
    }
    UrlRecord {
        location: base.as_str().to_string(),
        last_modified: inventory.home_page.as_ref().and_then(|p| p.last_modified),
        change_frequency: policy.change_frequency,
        priority: policy.priority,
        content_type: ContentType::Home,
        source: Source::Generated,
        validated: false,
        is_duplicate: false,
        metadata,
    }
}

/// Check one location.
pub fn validate_url(location: &str) -> ValidationResult {
    let mut errors = Vec::new();
    match Url::parse(location) {
        Ok(url) => {
            if url.scheme() != "https" {
                errors.push(format!("scheme must be https, got '{}'", url.scheme()));
            }
        }
        Err(e) => errors.push(format!("not an absolute URL: {e}")),
    }
    if location.contains('#') {
        errors.push("contains a fragment marker '#'".to_string());
    }
    ValidationResult::from_errors(errors)
}

/// Partition records into valid (flagged `validated`) and invalid.
pub fn validate_all(records: Vec<UrlRecord>, log: &mut RunLog) -> Validated {
    let mut validated = Validated::default();
    for mut record in records {
        let result = validate_url(&record.location);
        record.validated = result.valid;
        if result.valid {
            validated.valid.push(record);
        } else {
            log.error(
                STAGE,
                format!(
                    "invalid location '{}' ({}): {}",
                    record.location,
                    record.origin_key(),
                    result.errors.join("; ")
                ),
            );
            validated.invalid.push(record);
        }
    }
    validated
}

fn candidate(location: String, content_type: ContentType, source: Source, file: &FileRecord) -> UrlRecord {
    let policy = policy_for(&content_type);
    let mut metadata = BTreeMap::new();
    metadata.insert("relative_path".to_string(), file.relative_path.clone());
    UrlRecord {
        location,
        last_modified: file.last_modified,
        change_frequency: policy.change_frequency,
        priority: policy.priority,
        content_type,
        source,
        validated: false,
        is_duplicate: false,
        metadata,
    }
}

/// Join a site-relative page path onto the base.
///
/// Warns when the join had to percent-encode the path; the encoded form is
/// what gets published. A path that is absolute, scheme-relative or climbs
/// with `..` would land outside the base and is refused.
fn location_for(base: &Url, relative_path: &str, log: &mut RunLog) -> Option<String> {
    let path = naming::url_path(relative_path);
    if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        log.error(
            STAGE,
            format!("'{relative_path}' is not under the site root, skipping"),
        );
        return None;
    }
    match base.join(&path) {
        Ok(url) if !url.as_str().starts_with(base.as_str()) => {
            log.error(
                STAGE,
                format!("'{relative_path}' resolves to {url}, outside {base}, skipping"),
            );
            None
        }
        Ok(url) => {
            let location = url.to_string();
            if location != format!("{base}{path}") {
                log.warn(
                    STAGE,
                    format!("'{relative_path}' was percent-encoded as {location}"),
                );
            }
            Some(location)
        }
        Err(e) => {
            log.error(
                STAGE,
                format!("cannot build a URL for '{relative_path}': {e}"),
            );
            None
        }
    }
}
