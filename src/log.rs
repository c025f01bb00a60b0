//! Run log shared by every pipeline stage.
//!
//! The orchestrator constructs one [`RunLog`] and passes it by `&mut` into
//! each stage call. Every recorded event is emitted through `tracing` right
//! away and also kept, so the final report carries the full log alongside
//! the accumulated warnings and errors.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub level: Level,
    pub stage: &'static str,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.level, self.message)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunLog {
    pub entries: Vec<LogEntry>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, stage: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(stage, "{message}");
        self.push(Level::Info, stage, message);
    }

    /// Record a skipped unit. The run continues unaffected.
    pub fn warn(&mut self, stage: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage, "{message}");
        self.warnings.push(format!("[{stage}] {message}"));
        self.push(Level::Warning, stage, message);
    }

    /// Record a unit excluded from later stages. The run continues.
    pub fn error(&mut self, stage: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(stage, "{message}");
        self.errors.push(format!("[{stage}] {message}"));
        self.push(Level::Error, stage, message);
    }

    fn push(&mut self, level: Level, stage: &'static str, message: String) {
        self.entries.push(LogEntry {
            level,
            stage,
            message,
        });
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Entries recorded by one stage, in order.
    #[cfg(test)]
    pub fn stage_entries<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a LogEntry> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_and_errors_accumulate_separately() {
        let mut log = RunLog::new();
        log.info("scan", "starting");
        log.warn("scan", "directory missing: guides");
        log.error("urls", "invalid location");

        assert_eq!(log.entries.len(), 3);
        assert_eq!(log.warning_count(), 1);
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.warnings[0], "[scan] directory missing: guides");
        assert_eq!(log.errors[0], "[urls] invalid location");
    }

    #[test]
    fn stage_entries_filters_by_stage() {
        let mut log = RunLog::new();
        log.info("scan", "a");
        log.info("dedup", "b");
        log.warn("scan", "c");

        let messages: Vec<&str> = log
            .stage_entries("scan")
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(messages, vec!["a", "c"]);
    }

    #[test]
    fn entry_display_names_stage_and_level() {
        let entry = LogEntry {
            level: Level::Warning,
            stage: "scan",
            message: "skipped".into(),
        };
        assert_eq!(entry.to_string(), "[scan] WARNING: skipped");
    }
}
