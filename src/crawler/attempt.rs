//! Classification shared by both strategies
//!
//! Strategies differ only in how they fetch. Everything after the fetch, for index pages and
//! for article pages alike, goes through the functions here.

use crate::crawler::delay::DelayRange;
use crate::crawler::stats::RunStatistics;
use crate::registry::ModuleDescriptor;
use crate::state::LinkStatus;
use crate::storage::{Article, Storage};
use crate::{PluginError, PluginResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What every crawl task needs, cheap to clone into threads and tasks
#[derive(Clone)]
pub(crate) struct CrawlContext {
    pub storage: Arc<dyn Storage>,
    pub timeout: Duration,
    pub delay: DelayRange,
    pub max_articles: Option<usize>,
    pub cancel: Arc<AtomicBool>,
}

impl CrawlContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Result of crawling one module's index page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LinkHarvest {
    pub crawled: usize,
    pub stored: usize,
}

/// Result of one article link attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Extraction produced a titled article
    Completed(Article),

    /// Fetch or extraction failed, with the reason
    Failed(String),
}

impl LinkOutcome {
    pub fn status(&self) -> LinkStatus {
        match self {
            Self::Completed(_) => LinkStatus::Completed,
            Self::Failed(_) => LinkStatus::Failed,
        }
    }
}

/// A settled link: its outcome plus any failure to persist its new status
#[derive(Debug, Clone)]
pub(crate) struct LinkReport {
    pub module: String,
    pub outcome: LinkOutcome,
    pub status_error: Option<String>,
}

/// Runs a plugin call, turning a panic into its message
///
/// Plugin code is outside the crawler's control. A panic in one call must not take down the
/// worker or task that made it.
pub(crate) fn guarded<T>(call: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(call)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Blocking fetch through the plugin, with a panic reported as a plugin error
pub(crate) fn fetch_blocking(
    module: &ModuleDescriptor,
    url: &str,
    timeout: Duration,
) -> PluginResult<Option<String>> {
    guarded(|| module.plugin().fetch(url, timeout))
        .unwrap_or_else(|message| Err(PluginError::Panicked(message)))
}

/// Turns a fetched index page into stored links
///
/// Errors come back as the message to record for the module.
pub(crate) fn harvest_links(
    module: &ModuleDescriptor,
    fetched: PluginResult<Option<String>>,
    storage: &dyn Storage,
) -> Result<LinkHarvest, String> {
    let body = match fetched {
        Ok(Some(body)) => body,
        Ok(None) => {
            return Err(format!(
                "{}: empty response from {}",
                module.name, module.base_url
            ))
        }
        Err(e) => return Err(format!("{}: failed to fetch index page: {}", module.name, e)),
    };

    let links = match guarded(|| module.plugin().extract_links(&body)) {
        Ok(extracted) => {
            extracted.map_err(|e| format!("{}: failed to extract links: {}", module.name, e))?
        }
        Err(message) => {
            return Err(format!(
                "{}: link extractor panicked: {}",
                module.name, message
            ))
        }
    };

    let stored = storage
        .store_links(&links, &module.name)
        .map_err(|e| format!("{}: failed to store links: {}", module.name, e))?;

    tracing::info!(
        "{}: found {} links, {} new",
        module.name,
        links.len(),
        stored
    );

    Ok(LinkHarvest {
        crawled: links.len(),
        stored,
    })
}

/// Classifies one fetched article page and records the link's new status
///
/// Success requires a non-empty title. The link moves to `completed` or `failed` exactly
/// once per call.
pub(crate) fn settle_link(
    module: &ModuleDescriptor,
    url: &str,
    fetched: PluginResult<Option<String>>,
    storage: &dyn Storage,
) -> LinkReport {
    let outcome = classify(module, url, fetched);

    match &outcome {
        LinkOutcome::Completed(_) => tracing::debug!("{}: extracted {}", module.name, url),
        LinkOutcome::Failed(reason) => tracing::debug!("{}: {}", module.name, reason),
    }

    let status_error = storage
        .update_link_status(url, outcome.status())
        .err()
        .map(|e| format!("{}: failed to update status of {}: {}", module.name, url, e));

    LinkReport {
        module: module.name.clone(),
        outcome,
        status_error,
    }
}

fn classify(
    module: &ModuleDescriptor,
    url: &str,
    fetched: PluginResult<Option<String>>,
) -> LinkOutcome {
    let body = match fetched {
        Ok(Some(body)) => body,
        Ok(None) => {
            return LinkOutcome::Failed(format!("{}: empty response from {}", module.name, url))
        }
        Err(e) => {
            return LinkOutcome::Failed(format!(
                "{}: failed to fetch {}: {}",
                module.name, url, e
            ))
        }
    };

    let extracted = match guarded(|| module.plugin().extract_content(&body)) {
        Ok(extracted) => extracted,
        Err(message) => {
            return LinkOutcome::Failed(format!(
                "{}: extractor panicked on {}: {}",
                module.name, url, message
            ))
        }
    };

    match extracted {
        Ok(Some(content)) if content.has_title() => LinkOutcome::Completed(Article::new(
            url,
            content.title.trim(),
            content.content,
            content.pub_date,
            module.name.as_str(),
        )),
        Ok(Some(_)) => {
            LinkOutcome::Failed(format!("{}: no title extracted from {}", module.name, url))
        }
        Ok(None) => {
            LinkOutcome::Failed(format!("{}: no content extracted from {}", module.name, url))
        }
        Err(e) => LinkOutcome::Failed(format!(
            "{}: failed to extract {}: {}",
            module.name, url, e
        )),
    }
}

/// Folds settled links into the run counters and returns the articles to store
pub(crate) fn tally(stats: &mut RunStatistics, reports: Vec<LinkReport>) -> Vec<Article> {
    let mut articles = Vec::new();
    for report in reports {
        if let Some(error) = report.status_error {
            stats.record_error(error);
        }
        match report.outcome {
            LinkOutcome::Completed(article) => {
                stats.articles_crawled += 1;
                articles.push(article);
            }
            LinkOutcome::Failed(reason) => {
                stats.articles_failed += 1;
                stats.record_error(reason);
            }
        }
    }
    articles
}

/// Stores one module's articles as a single batch
pub(crate) fn store_batch(
    ctx: &CrawlContext,
    module: &str,
    articles: &[Article],
    stats: &mut RunStatistics,
) {
    record_batch(stats, write_batch(ctx.storage.as_ref(), module, articles));
}

/// Writes a batch and returns the stored count or the message to record
pub(crate) fn write_batch(
    storage: &dyn Storage,
    module: &str,
    articles: &[Article],
) -> Result<usize, String> {
    if articles.is_empty() {
        return Ok(0);
    }
    let stored = storage
        .store_articles(articles)
        .map_err(|e| format!("{}: failed to store articles: {}", module, e))?;
    tracing::info!("{}: stored {} of {} articles", module, stored, articles.len());
    Ok(stored)
}

pub(crate) fn record_batch(stats: &mut RunStatistics, written: Result<usize, String>) {
    match written {
        Ok(stored) => stats.articles_stored += stored,
        Err(message) => stats.record_error(message),
    }
}

/// Pending links for a module, honoring the per-module cap
pub(crate) fn pending_links(
    ctx: &CrawlContext,
    module: &str,
    stats: &mut RunStatistics,
) -> Vec<String> {
    match ctx.storage.get_pending_links(Some(module), ctx.max_articles) {
        Ok(links) => links,
        Err(e) => {
            stats.record_error(format!("{}: failed to read pending links: {}", module, e));
            Vec::new()
        }
    }
}
