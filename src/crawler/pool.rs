//! Worker-pool strategy
//!
//! Index pages are crawled one module after another. Article pages of a module are spread
//! over a fixed number of OS threads pulling from a shared queue.

use crate::crawler::attempt::{
    fetch_blocking, harvest_links, pending_links, settle_link, store_batch, tally, CrawlContext,
    LinkReport,
};
use crate::crawler::stats::RunStatistics;
use crate::registry::ModuleDescriptor;
use std::collections::VecDeque;
use std::sync::Mutex;

pub(crate) fn crawl_links(
    ctx: &CrawlContext,
    modules: &[ModuleDescriptor],
    stats: &mut RunStatistics,
) {
    for (index, module) in modules.iter().enumerate() {
        if ctx.is_cancelled() {
            tracing::info!("Interrupted, skipping remaining link crawls");
            return;
        }

        tracing::info!("{}: crawling index {}", module.name, module.base_url);
        let fetched = fetch_blocking(module, &module.base_url, ctx.timeout);

        match harvest_links(module, fetched, ctx.storage.as_ref()) {
            Ok(harvest) => {
                stats.links_crawled += harvest.crawled;
                stats.links_stored += harvest.stored;
            }
            Err(message) => stats.record_error(message),
        }

        if index + 1 < modules.len() {
            ctx.delay.sleep_blocking();
        }
    }
}

pub(crate) fn crawl_articles(
    ctx: &CrawlContext,
    modules: &[ModuleDescriptor],
    workers: usize,
    stats: &mut RunStatistics,
) {
    for module in modules {
        if ctx.is_cancelled() {
            tracing::info!("Interrupted, skipping remaining article crawls");
            return;
        }

        let pending = pending_links(ctx, &module.name, stats);
        if pending.is_empty() {
            tracing::info!("{}: no pending links", module.name);
            continue;
        }

        tracing::info!(
            "{}: crawling {} articles with {} workers",
            module.name,
            pending.len(),
            workers.min(pending.len())
        );

        let reports = run_pool(ctx, module, pending, workers, stats);
        let articles = tally(stats, reports);
        store_batch(ctx, &module.name, &articles, stats);
    }
}

/// Runs every link through `workers` threads and returns the reports once all have finished
fn run_pool(
    ctx: &CrawlContext,
    module: &ModuleDescriptor,
    links: Vec<String>,
    workers: usize,
    stats: &mut RunStatistics,
) -> Vec<LinkReport> {
    let worker_count = workers.max(1).min(links.len());
    let queue = Mutex::new(links.into_iter().collect::<VecDeque<_>>());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| scope.spawn(|| worker(ctx, module, &queue)))
            .collect();

        let mut reports = Vec::new();
        for handle in handles {
            match handle.join() {
                Ok(mut batch) => reports.append(&mut batch),
                Err(_) => stats.record_error(format!("{}: article worker panicked", module.name)),
            }
        }
        reports
    })
}

fn worker(
    ctx: &CrawlContext,
    module: &ModuleDescriptor,
    queue: &Mutex<VecDeque<String>>,
) -> Vec<LinkReport> {
    let mut reports = Vec::new();

    loop {
        if ctx.is_cancelled() {
            break;
        }

        let next = match queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => None,
        };
        let Some(url) = next else {
            break;
        };

        let fetched = fetch_blocking(module, &url, ctx.timeout);
        reports.push(settle_link(module, &url, fetched, ctx.storage.as_ref()));

        ctx.delay.sleep_blocking();
    }

    reports
}
