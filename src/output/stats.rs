//! Statistics reports
//!
//! Renders store statistics and run summaries as plain text for the terminal.

use crate::crawler::{RunOutcome, RunStatistics};
use crate::state::LinkStatus;
use crate::storage::StoreStatistics;
use std::fmt::Write;

/// How many recorded errors a run summary shows
pub const SUMMARY_ERROR_LIMIT: usize = 5;

/// Formats store-wide totals with per-source and per-status breakdowns
pub fn format_store_statistics(stats: &StoreStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Store Statistics ===\n");
    let _ = writeln!(out, "Articles: {}", stats.total_articles);

    // Largest sources first
    let mut sources: Vec<_> = stats.articles_by_source.iter().collect();
    sources.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (source, count) in sources {
        let _ = writeln!(out, "  {}: {}", source, count);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Links: {}", stats.total_links);
    for status in LinkStatus::all_statuses() {
        let count = stats.links_with_status(status);
        let percentage = if stats.total_links > 0 {
            (count as f64 / stats.total_links as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({:.1}%)", status, count, percentage);
    }

    out
}

/// Prints store statistics to stdout
pub fn print_store_statistics(stats: &StoreStatistics) {
    print!("{}", format_store_statistics(stats));
}

/// Formats the end-of-run summary, showing at most the first five errors
pub fn format_run_summary(stats: &RunStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Crawl Summary ===\n");
    let _ = writeln!(out, "Outcome: {}", stats.outcome);
    let _ = writeln!(
        out,
        "Duration: {:.1}s",
        stats.duration().num_milliseconds() as f64 / 1000.0
    );
    let _ = writeln!(
        out,
        "Modules: {} discovered, {} valid, {} processed",
        stats.modules_discovered, stats.modules_valid, stats.modules_processed
    );
    let _ = writeln!(
        out,
        "Links: {} crawled, {} new",
        stats.links_crawled, stats.links_stored
    );
    let _ = writeln!(
        out,
        "Articles: {} extracted, {} failed, {} stored",
        stats.articles_crawled, stats.articles_failed, stats.articles_stored
    );

    if stats.outcome != RunOutcome::NoModules {
        let _ = writeln!(
            out,
            "Store: {} articles, {} links ({} pending)",
            stats.store.total_articles,
            stats.store.total_links,
            stats.store.links_with_status(LinkStatus::Pending)
        );
    }

    if !stats.errors.is_empty() {
        let _ = writeln!(out, "\nErrors ({}):", stats.errors.len());
        for error in stats.errors.iter().take(SUMMARY_ERROR_LIMIT) {
            let _ = writeln!(out, "  - {}", error);
        }
        if stats.errors.len() > SUMMARY_ERROR_LIMIT {
            let _ = writeln!(
                out,
                "  ... and {} more",
                stats.errors.len() - SUMMARY_ERROR_LIMIT
            );
        }
    }

    out
}

/// Prints the run summary to stdout
pub fn print_run_summary(stats: &RunStatistics) {
    print!("{}", format_run_summary(stats));
}
