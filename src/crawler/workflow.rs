use crate::config::{ConcurrencyMode, Config};
use crate::crawler::attempt::CrawlContext;
use crate::crawler::delay::DelayRange;
use crate::crawler::stats::{RunOutcome, RunStatistics};
use crate::crawler::{cooperative, pool};
use crate::registry::{ModuleDescriptor, ModuleRegistry};
use crate::storage::Storage;
use crate::HarvestError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How article fetches are run concurrently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Links sequentially, then each module's articles on a pool of `workers` threads
    WorkerPool { workers: usize },

    /// Tokio tasks, at most `limit` fetches in flight across all modules
    Cooperative { limit: usize },
}

impl Strategy {
    pub fn from_config(config: &Config) -> Self {
        match config.crawler.mode {
            ConcurrencyMode::Threads => Self::WorkerPool {
                workers: config.crawler.max_workers as usize,
            },
            ConcurrencyMode::Async => Self::Cooperative {
                limit: config.crawler.max_concurrent as usize,
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerPool { workers } => write!(f, "worker pool, {} workers", workers),
            Self::Cooperative { limit } => write!(f, "cooperative, {} concurrent fetches", limit),
        }
    }
}

/// Run parameters derived from configuration and command line
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub strategy: Strategy,
    /// Module names to crawl; empty means all valid modules
    pub modules: Vec<String>,
    pub crawl_links: bool,
    pub crawl_articles: bool,
    /// Cap on pending links crawled per module
    pub max_articles: Option<usize>,
    pub delay: DelayRange,
    pub timeout: Duration,
}

impl WorkflowOptions {
    pub fn from_config(config: &Config) -> Self {
        let crawler = &config.crawler;
        Self {
            strategy: Strategy::from_config(config),
            modules: config.modules.enabled.clone(),
            crawl_links: crawler.crawl_links,
            crawl_articles: crawler.crawl_articles,
            max_articles: crawler.max_articles,
            delay: DelayRange::from_millis(crawler.delay_min_ms, crawler.delay_max_ms),
            timeout: Duration::from_secs(crawler.timeout_secs),
        }
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The crawl orchestrator
///
/// A run goes through discovery, module filtering, the link phase, the article phase and
/// finalization. Failures local to a module or a link are recorded in the returned
/// [`RunStatistics`]; only a failure to start the async runtime is returned as an error.
pub struct Workflow {
    registry: ModuleRegistry,
    storage: Arc<dyn Storage>,
    options: WorkflowOptions,
    cancel: Arc<AtomicBool>,
}

impl Workflow {
    pub fn new(
        registry: ModuleRegistry,
        storage: Arc<dyn Storage>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            registry,
            storage,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the run from launching new work once set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Runs the whole workflow on the calling thread
    ///
    /// The cooperative strategy builds its own tokio runtime, so this must not be called
    /// from inside one.
    pub fn run(&mut self) -> crate::Result<RunStatistics> {
        let mut stats = RunStatistics::new();
        tracing::info!("Starting crawl ({})", self.options.strategy);

        let valid = self.discover(&mut stats);
        let modules = select_modules(valid, &self.options.modules);
        stats.modules_processed = modules.len();

        if modules.is_empty() {
            stats.record_error(HarvestError::NoModules.to_string());
            self.finalize(&mut stats, RunOutcome::NoModules);
            return Ok(stats);
        }

        let ctx = self.context();

        match self.options.strategy {
            Strategy::WorkerPool { workers } => {
                if self.options.crawl_links {
                    pool::crawl_links(&ctx, &modules, &mut stats);
                }
                if self.options.crawl_articles && !ctx.is_cancelled() {
                    pool::crawl_articles(&ctx, &modules, workers, &mut stats);
                }
            }
            Strategy::Cooperative { limit } => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()?;
                let crawl_links = self.options.crawl_links;
                let crawl_articles = self.options.crawl_articles;

                runtime.block_on(async {
                    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
                    if crawl_links {
                        cooperative::crawl_links(&ctx, &modules, &semaphore, &mut stats).await;
                    }
                    if crawl_articles && !ctx.is_cancelled() {
                        cooperative::crawl_articles(&ctx, &modules, &semaphore, &mut stats).await;
                    }
                });
            }
        }

        let outcome = if ctx.is_cancelled() {
            RunOutcome::Interrupted
        } else {
            RunOutcome::Completed
        };
        self.finalize(&mut stats, outcome);
        Ok(stats)
    }

    /// Discovers and validates modules, recording every problem; returns the valid ones
    fn discover(&mut self, stats: &mut RunStatistics) -> Vec<ModuleDescriptor> {
        let modules = self.registry.discover();
        stats.modules_discovered = modules.len();

        for failure in self.registry.load_failures() {
            stats.record_error(format!(
                "Failed to load module {}: {}",
                failure.name, failure.reason
            ));
        }

        let mut valid = Vec::new();
        for module in modules {
            let (ok, errors) = self.registry.validate(&module.name);
            if ok {
                valid.push(module);
            } else {
                stats.record_error(format!(
                    "Module {} is invalid: {}",
                    module.name,
                    errors.join("; ")
                ));
            }
        }

        stats.modules_valid = valid.len();
        tracing::info!(
            "{} modules discovered, {} valid",
            stats.modules_discovered,
            stats.modules_valid
        );
        valid
    }

    fn context(&self) -> CrawlContext {
        CrawlContext {
            storage: Arc::clone(&self.storage),
            timeout: self.options.timeout,
            delay: self.options.delay,
            max_articles: self.options.max_articles,
            cancel: Arc::clone(&self.cancel),
        }
    }

    fn finalize(&self, stats: &mut RunStatistics, outcome: RunOutcome) {
        match self.storage.get_statistics() {
            Ok(store) => stats.store = store,
            Err(e) => stats.record_error(format!("Failed to read store statistics: {}", e)),
        }
        stats.outcome = outcome;
        stats.finished_at = Some(chrono::Utc::now());

        tracing::info!(
            "Crawl {} in {:.1}s: {} links stored, {} articles stored, {} errors",
            outcome,
            stats.duration().num_milliseconds() as f64 / 1000.0,
            stats.links_stored,
            stats.articles_stored,
            stats.errors.len()
        );
    }
}

/// Keeps the modules named in `filter`, or all of them when the filter is empty
fn select_modules(modules: Vec<ModuleDescriptor>, filter: &[String]) -> Vec<ModuleDescriptor> {
    if filter.is_empty() {
        return modules;
    }

    for name in filter {
        if !modules.iter().any(|module| &module.name == name) {
            tracing::warn!("Requested module {} is not available", name);
        }
    }

    modules
        .into_iter()
        .filter(|module| filter.contains(&module.name))
        .collect()
}
