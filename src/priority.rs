//! SEO metadata assignment.
//!
//! Stage 4 of the pipeline. Every record's priority and change frequency come
//! from a fixed per-content-type policy, and its last-modified date is
//! normalized to a plain calendar date.
//!
//! | Content type | Priority | Change frequency |
//! |--------------|----------|------------------|
//! | home         | 1.0      | daily            |
//! | item         | 0.8      | weekly           |
//! | category     | 0.7      | monthly          |
//! | guide        | 0.6      | monthly          |
//! | anything else| 0.5      | monthly          |
//!
//! Applying the policy is idempotent and cannot fail: a record missing its
//! date gets `today`, which the orchestrator fixes once per run.

use crate::log::RunLog;
use crate::types::{ChangeFreq, ContentType, UrlRecord};
use chrono::NaiveDate;

pub const STAGE: &str = "priority";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub priority: f64,
    pub change_frequency: ChangeFreq,
}

pub fn policy_for(content_type: &ContentType) -> Policy {
    let (priority, change_frequency) = match content_type {
        ContentType::Home => (1.0, ChangeFreq::Daily),
        ContentType::Item => (0.8, ChangeFreq::Weekly),
        ContentType::Category => (0.7, ChangeFreq::Monthly),
        ContentType::Guide => (0.6, ChangeFreq::Monthly),
        ContentType::Other(_) => (0.5, ChangeFreq::Monthly),
    };
    Policy {
        priority,
        change_frequency,
    }
}

/// Recompute metadata for one record.
pub fn calculate(record: UrlRecord, today: NaiveDate) -> UrlRecord {
    let policy = policy_for(&record.content_type);
    UrlRecord {
        priority: policy.priority.clamp(0.0, 1.0),
        change_frequency: policy.change_frequency,
        last_modified: Some(record.last_modified.unwrap_or(today)),
        ..record
    }
}

/// Apply the policy table to every record.
pub fn apply(records: Vec<UrlRecord>, today: NaiveDate, log: &mut RunLog) -> Vec<UrlRecord> {
    let undated = records.iter().filter(|r| r.last_modified.is_none()).count();
    if undated > 0 {
        log.info(
            STAGE,
            format!("{undated} records had no date, using {today}"),
        );
    }
    let records: Vec<UrlRecord> = records
        .into_iter()
        .map(|r| calculate(r, today))
        .collect();
    log.info(STAGE, format!("assigned metadata to {} records", records.len()));
    records
}
