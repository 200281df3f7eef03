//! Cooperative strategy
//!
//! Every fetch runs as a tokio task holding a permit from one semaphore shared by all
//! modules. Link crawls for all modules run together and must all finish before the first
//! article task starts. Each module's article pass stores its batch as soon as its own tasks
//! are done.

use crate::crawler::attempt::{
    fetch_blocking, harvest_links, pending_links, record_batch, settle_link, tally, write_batch,
    CrawlContext, LinkOutcome, LinkReport,
};
use crate::crawler::stats::RunStatistics;
use crate::registry::ModuleDescriptor;
use crate::storage::Article;
use crate::{PluginError, PluginResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub(crate) async fn crawl_links(
    ctx: &CrawlContext,
    modules: &[ModuleDescriptor],
    semaphore: &Arc<Semaphore>,
    stats: &mut RunStatistics,
) {
    let mut tasks = Vec::with_capacity(modules.len());

    for (index, module) in modules.iter().enumerate() {
        if ctx.is_cancelled() {
            tracing::info!("Interrupted, skipping remaining link crawls");
            break;
        }

        let ctx = ctx.clone();
        let module = module.clone();
        let semaphore = Arc::clone(semaphore);
        let pause = index + 1 < modules.len();
        let name = module.name.clone();

        let task = tokio::spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    tracing::info!("{}: crawling index {}", module.name, module.base_url);
                    let fetched = fetch(&module, &module.base_url, ctx.timeout).await;
                    harvest_links(&module, fetched, ctx.storage.as_ref())
                }
                Err(e) => Err(format!("{}: limiter closed: {}", module.name, e)),
            };
            if pause {
                ctx.delay.sleep().await;
            }
            result
        });
        tasks.push((name, task));
    }

    // Every task is already running; awaiting in order only fixes the order of the counters
    for (name, task) in tasks {
        match task.await {
            Ok(Ok(harvest)) => {
                stats.links_crawled += harvest.crawled;
                stats.links_stored += harvest.stored;
            }
            Ok(Err(message)) => stats.record_error(message),
            Err(e) => stats.record_error(format!("{}: link crawl task failed: {}", name, e)),
        }
    }
}

pub(crate) async fn crawl_articles(
    ctx: &CrawlContext,
    modules: &[ModuleDescriptor],
    semaphore: &Arc<Semaphore>,
    stats: &mut RunStatistics,
) {
    let mut passes = Vec::with_capacity(modules.len());

    for module in modules {
        if ctx.is_cancelled() {
            tracing::info!("Interrupted, skipping remaining article crawls");
            break;
        }

        let pending = pending_links(ctx, &module.name, stats);
        if pending.is_empty() {
            tracing::info!("{}: no pending links", module.name);
            continue;
        }
        tracing::info!("{}: queueing {} articles", module.name, pending.len());

        let pass = tokio::spawn(article_pass(
            ctx.clone(),
            module.clone(),
            pending,
            Arc::clone(semaphore),
        ));
        passes.push((module.name.clone(), pass));
    }

    for (name, pass) in passes {
        match pass.await {
            Ok(pass) => {
                for failure in pass.task_failures {
                    stats.articles_failed += 1;
                    stats.record_error(failure);
                }
                tally(stats, pass.reports);
                record_batch(stats, pass.written);
            }
            Err(e) => stats.record_error(format!("{}: article pass failed: {}", name, e)),
        }
    }
}

/// One module's article tasks, gathered and stored as a batch once all of them finish
struct ArticlePass {
    reports: Vec<LinkReport>,
    task_failures: Vec<String>,
    written: Result<usize, String>,
}

async fn article_pass(
    ctx: CrawlContext,
    module: ModuleDescriptor,
    pending: Vec<String>,
    semaphore: Arc<Semaphore>,
) -> ArticlePass {
    let mut tasks: JoinSet<Option<LinkReport>> = JoinSet::new();

    for url in pending {
        let ctx = ctx.clone();
        let module = module.clone();
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let permit = semaphore.acquire_owned().await.ok()?;
            if ctx.is_cancelled() {
                return None;
            }
            let fetched = fetch(&module, &url, ctx.timeout).await;
            let report = settle_link(&module, &url, fetched, ctx.storage.as_ref());
            drop(permit);
            ctx.delay.sleep().await;
            Some(report)
        });
    }

    let mut reports = Vec::new();
    let mut task_failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(report)) => reports.push(report),
            Ok(None) => {}
            Err(e) => task_failures.push(format!("{}: article task failed: {}", module.name, e)),
        }
    }

    let articles: Vec<Article> = reports
        .iter()
        .filter_map(|report| match &report.outcome {
            LinkOutcome::Completed(article) => Some(article.clone()),
            LinkOutcome::Failed(_) => None,
        })
        .collect();
    let written = write_batch(ctx.storage.as_ref(), &module.name, &articles);

    ArticlePass {
        reports,
        task_failures,
        written,
    }
}

/// Fetches with the async capability, or on the blocking pool when the module has none
///
/// The caller's permit stays held while the blocking fetch runs.
async fn fetch(
    module: &ModuleDescriptor,
    url: &str,
    timeout: Duration,
) -> PluginResult<Option<String>> {
    if let Some(fetcher) = module.plugin().as_async() {
        return fetcher.fetch_async(url, timeout).await;
    }

    let module = module.clone();
    let url = url.to_string();
    tokio::task::spawn_blocking(move || fetch_blocking(&module, &url, timeout))
        .await
        .map_err(|e| PluginError::Join(e.to_string()))?
}
