//! Pipeline orchestration.
//!
//! [`SitemapOrchestrator`] owns the configuration and runs the stages strictly
//! in order, each consuming the previous stage's output in full:
//!
//! ```text
//! scan → urls → dedup → priority → sitemap → write
//! ```
//!
//! It is the only part of the crate that touches the output directory. Nothing
//! is written until every document has passed self-validation, and documents
//! replace the previous run's only after all of them were written. When a stage
//! fails, the failure is logged, a partial report is written on a best-effort
//! basis, and the error is returned to the caller.

use crate::config::{ConfigError, SitemapConfig};
use crate::log::RunLog;
use crate::report::RunReport;
use crate::sitemap::{self, SitemapError, SitemapSet, SitemapSettings};
use crate::{dedup, priority, scan, urls};
use chrono::{Local, NaiveDate};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

pub const STAGE: &str = "pipeline";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error(transparent)]
    Sitemap(#[from] SitemapError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: RunReport,
    pub sitemaps: SitemapSet,
    /// Files written, sitemap documents first and the report last. Empty for
    /// [`SitemapOrchestrator::check`].
    pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Write,
    DryRun,
}

pub struct SitemapOrchestrator {
    config: SitemapConfig,
    today: NaiveDate,
}

impl SitemapOrchestrator {
    /// `today` comes from the config when set, otherwise the local date.
    pub fn new(config: SitemapConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let today = config.today.unwrap_or_else(|| Local::now().date_naive());
        Ok(Self { config, today })
    }

    pub fn config(&self) -> &SitemapConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Run every stage and write the sitemap documents and report.
    pub fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.execute(Mode::Write)
    }

    /// Run every stage, including self-validation, without writing anything.
    pub fn check(&self) -> Result<RunOutcome, PipelineError> {
        self.execute(Mode::DryRun)
    }

    fn execute(&self, mode: Mode) -> Result<RunOutcome, PipelineError> {
        let mut log = RunLog::new();
        let mut report = RunReport::new(&self.config.base_url, self.today);

        let result = self
            .stages(&mut log, &mut report)
            .and_then(|set| match mode {
                Mode::Write => self.write_documents(&set, &mut log).map(|w| (set, w)),
                Mode::DryRun => Ok((set, Vec::new())),
            });

        match result {
            Ok((sitemaps, mut written)) => {
                report.finish(&log, None);
                if mode == Mode::Write {
                    match self.write_report(&report) {
                        Ok(path) => written.push(path),
                        Err(e) => {
                            log.error(STAGE, format!("cannot write run report: {e}"));
                            return Err(e);
                        }
                    }
                }
                tracing::info!(
                    urls = report.summary.included_urls,
                    documents = report.summary.sitemap_documents,
                    warnings = log.warning_count(),
                    errors = log.error_count(),
                    "sitemap run complete"
                );
                Ok(RunOutcome {
                    report,
                    sitemaps,
                    written,
                })
            }
            Err(e) => {
                log.error(STAGE, format!("run failed: {e}"));
                report.finish(&log, Some(e.to_string()));
                if mode == Mode::Write {
                    if let Err(write_err) = self.write_report(&report) {
                        tracing::error!(stage = STAGE, "partial report not written: {write_err}");
                    }
                }
                Err(e)
            }
        }
    }

    fn stages(&self, log: &mut RunLog, report: &mut RunReport) -> Result<SitemapSet, PipelineError> {
        let base = Url::parse(&self.config.base())?;
        log.info(
            STAGE,
            format!(
                "building sitemap for {base} from {} (run date {})",
                self.config.site_root.display(),
                self.today
            ),
        );

        let inventory = scan::scan(&self.config, log);
        report.summary.files_scanned = inventory.file_count();
        report.summary.catalog_entries_verified = inventory.catalog.len();

        let mut candidates = urls::generate_from_files(&inventory, &base, log);
        candidates.merge(urls::generate_from_catalog(&inventory.catalog, &base, log));
        report.summary.candidate_urls = candidates.checked();
        report.summary.invalid_urls = candidates.invalid.len();
        report.validation.urls_checked = candidates.checked();
        report.validation.urls_valid = candidates.valid.len();
        report.validation.urls_invalid = candidates.invalid.len();

        let resolved = dedup::resolve(candidates.valid, log);
        report.summary.duplicate_urls = resolved.duplicate_count();
        report.duplicates = resolved.resolutions;

        let records = priority::apply(resolved.records, self.today, log);
        report.record_included(&records);

        let settings = SitemapSettings::from_config(&self.config, self.today);
        let set = sitemap::generate(&records, &settings, log)?;
        report.record_documents(&set);
        Ok(set)
    }

    /// Stage every document beside its final path, then rename them all into
    /// place. A failed write removes what was staged and leaves the previous
    /// documents untouched.
    fn write_documents(&self, set: &SitemapSet, log: &mut RunLog) -> Result<Vec<PathBuf>, PipelineError> {
        fs::create_dir_all(&self.config.output.dir)?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();
        for document in set.documents() {
            let temp = self.config.output_path(&staging_name(&document.filename));
            if let Err(e) = fs::write(&temp, &document.content) {
                discard(staged.into_iter().map(|(temp, _)| temp));
                return Err(e.into());
            }
            staged.push((temp, self.config.output_path(&document.filename)));
        }

        let mut written = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();
        while let Some((temp, path)) = pending.next() {
            if let Err(e) = fs::rename(&temp, &path) {
                discard(std::iter::once(temp).chain(pending.map(|(temp, _)| temp)));
                return Err(e.into());
            }
            written.push(path);
        }
        for (path, document) in written.iter().zip(set.documents()) {
            log.info(
                STAGE,
                format!("wrote {} ({} entries)", path.display(), document.entries),
            );
        }

        self.remove_stale(set, log)?;
        Ok(written)
    }

    /// Delete chunk and index files left by a previous, larger run.
    fn remove_stale(&self, set: &SitemapSet, log: &mut RunLog) -> Result<(), PipelineError> {
        let settings = SitemapSettings::from_config(&self.config, self.today);
        let mut stale = Vec::new();
        if !set.is_chunked() {
            stale.push(self.config.output_path(&settings.index_name));
        }
        let mut n = set.sitemaps.len() + 1;
        loop {
            let path = self.config.output_path(&settings.chunk_name(n));
            if !path.exists() {
                break;
            }
            stale.push(path);
            n += 1;
        }
        for path in stale.into_iter().filter(|p| p.exists()) {
            fs::remove_file(&path)?;
            log.info(STAGE, format!("removed stale {}", path.display()));
        }
        Ok(())
    }

    fn write_report(&self, report: &RunReport) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.config.output.dir)?;
        let path = self.config.output_path(&self.config.output.report);
        fs::write(&path, report.to_json()?)?;
        Ok(path)
    }
}

/// Hidden temp name a document is written under before it is renamed.
fn staging_name(filename: &str) -> String {
    format!(".{filename}.tmp")
}

fn discard(paths: impl Iterator<Item = PathBuf>) {
    for path in paths {
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(stage = STAGE, "cannot remove {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunStatus;
    use crate::test_helpers::*;
    use serde_json::json;

    #[test]
    fn invalid_config_rejected_up_front() {
        let mut config = SiteFixture::new().config();
        config.base_url = "http://insecure.example.com".into();
        assert!(matches!(
            SitemapOrchestrator::new(config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn index_sharing_the_sitemap_name_rejected_before_writing() {
        let site = SiteFixture::new();
        site.page("models/a.html", "2024-01-01");
        let mut config = site.config();
        config.output.index = config.output.sitemap.clone();

        assert!(matches!(
            SitemapOrchestrator::new(config),
            Err(PipelineError::Config(ConfigError::Validation(_)))
        ));
        assert!(!site.output_dir().exists());
    }

    #[test]
    fn today_defaults_from_config() {
        let site = SiteFixture::new();
        let orchestrator = SitemapOrchestrator::new(site.config()).unwrap();
        assert_eq!(orchestrator.today(), date("2025-01-15"));
    }

    #[test]
    fn check_writes_nothing() {
        let site = SiteFixture::new();
        site.page("models/a.html", "2024-01-01");

        let outcome = SitemapOrchestrator::new(site.config()).unwrap().check().unwrap();

        assert!(outcome.written.is_empty());
        assert!(!site.output_dir().exists());
        assert_eq!(outcome.report.summary.included_urls, 2);
        assert_eq!(outcome.report.status, RunStatus::Success);
    }

    #[test]
    fn run_writes_sitemap_and_report() {
        let site = SiteFixture::new();
        site.page("models/a.html", "2024-01-01");

        let outcome = SitemapOrchestrator::new(site.config()).unwrap().run().unwrap();

        assert_eq!(
            outcome.written,
            vec![
                site.output_dir().join("sitemap.xml"),
                site.output_dir().join("sitemap-report.json"),
            ]
        );
        assert!(outcome.written.iter().all(|p| p.exists()));
    }

    #[test]
    fn report_counts_every_stage() {
        let site = SiteFixture::new();
        site.page("models/llama-2-7b-chat.html", "2024-03-01");
        site.page("guides/setup.html", "2024-02-01");
        site.page("guides/c#.html", "2024-02-01");
        site.catalog(json!([
            {"modelName": "Llama 2 7B Chat"},
            {"modelName": "Ghost"},
        ]));

        let outcome = SitemapOrchestrator::new(site.config()).unwrap().check().unwrap();
        let summary = &outcome.report.summary;

        assert_eq!(summary.files_scanned, 3);
        assert_eq!(summary.catalog_entries_verified, 1);
        // 3 files + home + 1 catalog
        assert_eq!(summary.candidate_urls, 5);
        assert_eq!(summary.invalid_urls, 1);
        assert_eq!(summary.duplicate_urls, 1);
        assert_eq!(summary.included_urls, 3);
        assert_eq!(outcome.report.duplicates.len(), 1);
        assert_eq!(outcome.report.per_type["item"], 1);
        assert_eq!(outcome.report.per_type["guide"], 1);
        assert_eq!(outcome.report.per_type["home"], 1);
    }

    #[test]
    fn shrinking_run_removes_stale_chunks() {
        let site = SiteFixture::new();
        for i in 0..5 {
            site.page(&format!("models/m{i}.html"), "2024-01-01");
        }
        let mut config = site.config();
        config.limits.max_urls = 2;
        SitemapOrchestrator::new(config).unwrap().run().unwrap();
        assert!(site.output_dir().join("sitemap-3.xml").exists());
        assert!(site.output_dir().join("sitemap-index.xml").exists());

        SitemapOrchestrator::new(site.config()).unwrap().run().unwrap();

        assert!(site.output_dir().join("sitemap.xml").exists());
        assert!(!site.output_dir().join("sitemap-2.xml").exists());
        assert!(!site.output_dir().join("sitemap-3.xml").exists());
        assert!(!site.output_dir().join("sitemap-index.xml").exists());
    }

    #[test]
    fn failed_write_keeps_previous_documents() {
        let site = SiteFixture::new();
        for i in 0..5 {
            site.page(&format!("models/m{i}.html"), "2024-01-01");
        }
        let mut config = site.config();
        config.limits.max_urls = 2;
        SitemapOrchestrator::new(config.clone()).unwrap().run().unwrap();
        let dist = site.output_dir();
        let index_before = fs::read_to_string(dist.join("sitemap-index.xml")).unwrap();

        // A fourth chunk is needed, and the third cannot be staged.
        site.page("models/m5.html", "2024-01-01");
        site.page("models/m6.html", "2024-01-01");
        fs::create_dir_all(dist.join(staging_name("sitemap-3.xml"))).unwrap();
        let err = SitemapOrchestrator::new(config).unwrap().run().unwrap_err();

        assert!(matches!(err, PipelineError::Io(_)), "{err}");
        assert_eq!(
            fs::read_to_string(dist.join("sitemap-index.xml")).unwrap(),
            index_before
        );
        assert!(!dist.join("sitemap-4.xml").exists());
        assert!(!dist.join(staging_name("sitemap.xml")).exists());
        assert!(!dist.join(staging_name("sitemap-2.xml")).exists());
    }

    #[test]
    fn successful_run_leaves_no_staging_files() {
        let site = SiteFixture::new();
        site.page("models/a.html", "2024-01-01");

        SitemapOrchestrator::new(site.config()).unwrap().run().unwrap();

        let mut names: Vec<String> = fs::read_dir(site.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["sitemap-report.json", "sitemap.xml"]);
    }
}
