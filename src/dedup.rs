//! Duplicate location resolution.
//!
//! Stage 3 of the pipeline. Records that share an identical `location` form a
//! [`DuplicateGroup`]; each group resolves to exactly one winner by a fixed
//! precedence:
//!
//! 1. A file-sourced record beats catalog or generated records. A rendered
//!    page on disk is stronger evidence than a catalog claim.
//! 2. Higher `priority`.
//! 3. More recent `last_modified` (a dated record beats an undated one).
//! 4. Lexicographically first origin (relative page path or slug).
//! 5. Earliest produced.
//!
//! Losers are returned flagged `is_duplicate` rather than dropped, and every
//! decision is recorded as a [`Resolution`] for the run report.

use crate::log::RunLog;
use crate::types::{Source, UrlRecord};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const STAGE: &str = "dedup";

/// Two or more records sharing one location, by index into the record list.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub location: String,
    pub members: Vec<usize>,
}

/// Audit summary of one record taking part in a resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contender {
    pub source: Source,
    pub priority: f64,
    pub last_modified: Option<NaiveDate>,
    pub origin: String,
}

impl From<&UrlRecord> for Contender {
    fn from(record: &UrlRecord) -> Self {
        Self {
            source: record.source,
            priority: record.priority,
            last_modified: record.last_modified,
            origin: record.origin_key().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub location: String,
    pub winner: Contender,
    pub losers: Vec<Contender>,
    pub reason: String,
}

/// Records after resolution, losers flagged, plus the decision trace.
#[derive(Debug, Default)]
pub struct Resolved {
    pub records: Vec<UrlRecord>,
    pub resolutions: Vec<Resolution>,
}

impl Resolved {
    pub fn duplicate_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_duplicate).count()
    }
}

/// Detect and resolve in one step.
pub fn resolve(records: Vec<UrlRecord>, log: &mut RunLog) -> Resolved {
    let groups = detect_duplicates(&records);
    let resolved = resolve_duplicates(records, &groups, log);
    log.info(
        STAGE,
        format!(
            "{} duplicate groups, {} records flagged",
            resolved.resolutions.len(),
            resolved.duplicate_count()
        ),
    );
    resolved
}

/// Group records by identical location; only groups of two or more.
///
/// Groups come back ordered by location.
pub fn detect_duplicates(records: &[UrlRecord]) -> Vec<DuplicateGroup> {
    let mut by_location: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        by_location.entry(record.location.as_str()).or_default().push(i);
    }
    by_location
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(location, members)| DuplicateGroup {
            location: location.to_string(),
            members,
        })
        .collect()
}

/// Pick a winner in each group and flag the rest.
pub fn resolve_duplicates(
    records: Vec<UrlRecord>,
    groups: &[DuplicateGroup],
    log: &mut RunLog,
) -> Resolved {
    let mut losers = vec![false; records.len()];
    let mut resolutions = Vec::with_capacity(groups.len());

    for group in groups {
        let mut ranked = group.members.clone();
        // Stable sort keeps production order as the final tiebreak.
        ranked.sort_by(|&a, &b| precedence(&records[a], &records[b]));

        let winner = &records[ranked[0]];
        let reason = decisive_rule(winner, &records[ranked[1]]);
        for &i in &ranked[1..] {
            losers[i] = true;
        }

        log.info(
            STAGE,
            format!(
                "{}: kept {} record ({}), flagged {} ({reason})",
                group.location,
                winner.source,
                winner.origin_key(),
                ranked.len() - 1
            ),
        );
        resolutions.push(Resolution {
            location: group.location.clone(),
            winner: Contender::from(winner),
            losers: ranked[1..].iter().map(|&i| Contender::from(&records[i])).collect(),
            reason,
        });
    }

    let records = records
        .into_iter()
        .zip(losers)
        .map(|(record, lost)| UrlRecord {
            is_duplicate: record.is_duplicate || lost,
            ..record
        })
        .collect();

    Resolved {
        records,
        resolutions,
    }
}

fn source_rank(source: Source) -> u8 {
    match source {
        Source::File => 0,
        Source::Catalog | Source::Generated => 1,
    }
}

/// `Less` means `a` should win over `b`.
fn precedence(a: &UrlRecord, b: &UrlRecord) -> Ordering {
    source_rank(a.source)
        .cmp(&source_rank(b.source))
        .then_with(|| b.priority.total_cmp(&a.priority))
        .then_with(|| b.last_modified.cmp(&a.last_modified))
        .then_with(|| a.origin_key().cmp(b.origin_key()))
}

/// Name the first rule that separates the winner from the runner-up.
fn decisive_rule(winner: &UrlRecord, runner_up: &UrlRecord) -> String {
    if source_rank(winner.source) != source_rank(runner_up.source) {
        return format!(
            "{}-sourced record preferred over {}-sourced",
            winner.source, runner_up.source
        );
    }
    if winner.priority != runner_up.priority {
        return format!(
            "higher priority ({:.1} > {:.1})",
            winner.priority, runner_up.priority
        );
    }
    if winner.last_modified != runner_up.last_modified {
        let show = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "none".into());
        return format!(
            "more recent last-modified ({} > {})",
            show(winner.last_modified),
            show(runner_up.last_modified)
        );
    }
    if winner.origin_key() != runner_up.origin_key() {
        return format!(
            "lexicographically first origin ('{}' < '{}')",
            winner.origin_key(),
            runner_up.origin_key()
        );
    }
    "identical candidates, first produced kept".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    const LOC: &str = "https://models.example.com/models/phi-2.html";

    fn with_origin(mut r: UrlRecord, origin: &str) -> UrlRecord {
        r.metadata.insert("relative_path".into(), origin.into());
        r
    }

    #[test]
    fn detect_groups_only_shared_locations() {
        let records = vec![
            record(LOC, Source::File),
            record("https://models.example.com/other.html", Source::File),
            record(LOC, Source::Catalog),
        ];

        let groups = detect_duplicates(&records);

        assert_eq!(
            groups,
            vec![DuplicateGroup {
                location: LOC.to_string(),
                members: vec![0, 2],
            }]
        );
    }

    #[test]
    fn no_duplicates_no_groups() {
        assert!(detect_duplicates(&many_records(5)).is_empty());
    }

    #[test]
    fn file_beats_catalog_even_with_lower_priority() {
        let mut log = RunLog::new();
        let mut catalog = record(LOC, Source::Catalog);
        catalog.priority = 1.0;
        catalog.last_modified = Some(date("2025-01-01"));
        let file = record(LOC, Source::File);

        let resolved = resolve(vec![catalog, file], &mut log);

        assert!(resolved.records[0].is_duplicate);
        assert!(!resolved.records[1].is_duplicate);
        assert_eq!(resolved.resolutions.len(), 1);
        assert_eq!(resolved.resolutions[0].winner.source, Source::File);
        assert!(resolved.resolutions[0].reason.contains("file-sourced"));
    }

    #[test]
    fn higher_priority_wins_between_files() {
        let mut log = RunLog::new();
        let mut low = record(LOC, Source::File);
        low.priority = 0.6;
        let high = record(LOC, Source::File);

        let resolved = resolve(vec![low, high], &mut log);

        assert!(resolved.records[0].is_duplicate);
        assert!(!resolved.records[1].is_duplicate);
        assert_eq!(resolved.resolutions[0].reason, "higher priority (0.8 > 0.6)");
    }

    #[test]
    fn more_recent_wins_remaining_ties() {
        let mut log = RunLog::new();
        let older = record(LOC, Source::File);
        let mut newer = record(LOC, Source::File);
        newer.last_modified = Some(date("2024-06-01"));

        let resolved = resolve(vec![older, newer], &mut log);

        assert!(resolved.records[0].is_duplicate);
        assert!(!resolved.records[1].is_duplicate);
        assert!(resolved.resolutions[0].reason.contains("2024-06-01 > 2024-01-01"));
    }

    #[test]
    fn dated_beats_undated() {
        let mut log = RunLog::new();
        let mut undated = record(LOC, Source::File);
        undated.last_modified = None;
        let dated = record(LOC, Source::File);

        let resolved = resolve(vec![undated, dated], &mut log);

        assert!(resolved.records[0].is_duplicate);
    }

    #[test]
    fn full_tie_breaks_on_origin_path() {
        let mut log = RunLog::new();
        let b = with_origin(record(LOC, Source::File), "models/b.html");
        let a = with_origin(record(LOC, Source::File), "models/a.html");

        let resolved = resolve(vec![b, a], &mut log);

        assert!(resolved.records[0].is_duplicate);
        assert!(!resolved.records[1].is_duplicate);
        assert_eq!(resolved.resolutions[0].winner.origin, "models/a.html");
    }

    #[test]
    fn identical_candidates_keep_first() {
        let mut log = RunLog::new();
        let resolved = resolve(vec![record(LOC, Source::File), record(LOC, Source::File)], &mut log);

        assert!(!resolved.records[0].is_duplicate);
        assert!(resolved.records[1].is_duplicate);
        assert_eq!(
            resolved.resolutions[0].reason,
            "identical candidates, first produced kept"
        );
    }

    #[test]
    fn losers_retained_for_audit() {
        let mut log = RunLog::new();
        let records = vec![
            record(LOC, Source::Catalog),
            record(LOC, Source::File),
            record(LOC, Source::Generated),
        ];

        let resolved = resolve(records, &mut log);

        assert_eq!(resolved.records.len(), 3);
        assert_eq!(resolved.duplicate_count(), 2);
        assert_eq!(resolved.resolutions[0].losers.len(), 2);
        assert_eq!(
            resolved.records.iter().filter(|r| r.is_included()).count(),
            1
        );
    }

    #[test]
    fn resolution_is_order_independent() {
        let mut log = RunLog::new();
        let a = with_origin(record(LOC, Source::Catalog), "models/phi-2.html");
        let mut b = with_origin(record(LOC, Source::File), "models/phi-2.html");
        b.last_modified = Some(date("2023-01-01"));

        let forward = resolve(vec![a.clone(), b.clone()], &mut log);
        let backward = resolve(vec![b, a], &mut log);

        assert_eq!(forward.resolutions[0].winner, backward.resolutions[0].winner);
    }
}
