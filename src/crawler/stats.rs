use crate::storage::StoreStatistics;
use chrono::{DateTime, Utc};
use std::fmt;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every enabled phase ran to the end
    Completed,

    /// Nothing left to crawl after discovery and filtering
    NoModules,

    /// Stopped early by an interrupt
    Interrupted,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::NoModules => f.write_str("no modules"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

/// Counters and errors collected over one workflow run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub modules_discovered: usize,
    pub modules_valid: usize,
    /// Valid modules left after the name filter
    pub modules_processed: usize,
    pub links_crawled: usize,
    pub links_stored: usize,
    pub articles_crawled: usize,
    pub articles_failed: usize,
    pub articles_stored: usize,
    /// Recorded failures in the order they happened
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    /// Store-wide counts taken when the run finished
    pub store: StoreStatistics,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            modules_discovered: 0,
            modules_valid: 0,
            modules_processed: 0,
            links_crawled: 0,
            links_stored: 0,
            articles_crawled: 0,
            articles_failed: 0,
            articles_stored: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: RunOutcome::Completed,
            store: StoreStatistics::default(),
        }
    }

    /// Logs a failure and keeps it for the run summary
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.errors.push(message);
    }

    /// Wall-clock duration, up to now while the run is still going
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}
