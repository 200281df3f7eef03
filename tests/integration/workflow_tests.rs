//! Integration tests for the crawl workflow
//!
//! These tests drive both concurrency strategies with in-process site plugins and check
//! what ends up in the store.

use async_trait::async_trait;
use news_harvester::crawler::{
    DelayRange, RunOutcome, RunStatistics, Strategy, Workflow, WorkflowOptions,
};
use news_harvester::plugin::{ArticleContent, AsyncFetch, SitePlugin};
use news_harvester::registry::ModuleRegistry;
use news_harvester::storage::{SqliteStorage, Storage};
use news_harvester::{LinkStatus, PluginError, PluginResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const STRATEGIES: [Strategy; 2] = [
    Strategy::WorkerPool { workers: 3 },
    Strategy::Cooperative { limit: 4 },
];

/// A site whose index page lists one url per line and whose pages are `title|content|date`
struct MockSite {
    name: String,
    base_url: String,
    base_domain: String,
    index: Option<String>,
    pages: HashMap<String, String>,
    async_fetch: bool,
    crashing_links: bool,
    awaits_article: Option<(Arc<SqliteStorage>, String)>,
    fetches: AtomicUsize,
}

impl MockSite {
    fn new(name: &str, articles: usize) -> Self {
        let base_url = format!("https://{}.test/", name);
        let links: Vec<String> = (0..articles)
            .map(|i| format!("{}news/{}.html", base_url, i))
            .collect();
        let pages = links
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let body = format!("Story {} from {}|Body {}|2024-01-0{}", i, name, i, i + 1);
                (url.clone(), body)
            })
            .collect();

        Self {
            name: name.to_string(),
            base_url,
            base_domain: format!("{}.test", name),
            index: Some(links.join("\n")),
            pages,
            async_fetch: true,
            crashing_links: false,
            awaits_article: None,
            fetches: AtomicUsize::new(0),
        }
    }

    fn unreachable(mut self) -> Self {
        self.index = None;
        self
    }

    fn blocking_only(mut self) -> Self {
        self.async_fetch = false;
        self
    }

    fn crashing_links(mut self) -> Self {
        self.crashing_links = true;
        self
    }

    /// Article fetches hold off until `url` has an article in `storage`
    fn awaiting_article(mut self, storage: &Arc<SqliteStorage>, url: String) -> Self {
        self.awaits_article = Some((Arc::clone(storage), url));
        self
    }

    fn with_page(mut self, index: usize, body: &str) -> Self {
        let url = format!("{}news/{}.html", self.base_url, index);
        self.pages.insert(url, body.to_string());
        self
    }

    fn without_domain(mut self) -> Self {
        self.base_domain = String::new();
        self
    }

    fn url(&self, index: usize) -> String {
        format!("{}news/{}.html", self.base_url, index)
    }
}

impl SitePlugin for MockSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn base_domain(&self) -> &str {
        &self.base_domain
    }

    fn fetch(&self, url: &str, _timeout: Duration) -> PluginResult<Option<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let body = if url == self.base_url {
            self.index.clone()
        } else {
            self.pages.get(url).cloned()
        };
        match body {
            Some(body) => Ok(Some(body)),
            None => Err(PluginError::Status {
                url: url.to_string(),
                status: 503,
            }),
        }
    }

    fn extract_links(&self, body: &str) -> PluginResult<Vec<String>> {
        if self.crashing_links {
            panic!("link extractor crashed");
        }
        Ok(body
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    fn extract_content(&self, body: &str) -> PluginResult<Option<ArticleContent>> {
        if body == "PANIC" {
            panic!("extractor crashed");
        }
        let mut parts = body.splitn(3, '|');
        Ok(Some(ArticleContent {
            title: parts.next().unwrap_or_default().to_string(),
            content: parts.next().unwrap_or_default().to_string(),
            pub_date: parts.next().unwrap_or_default().to_string(),
        }))
    }

    fn as_async(&self) -> Option<&dyn AsyncFetch> {
        if self.async_fetch {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl AsyncFetch for MockSite {
    async fn fetch_async(&self, url: &str, timeout: Duration) -> PluginResult<Option<String>> {
        tokio::task::yield_now().await;
        if let Some((storage, awaited)) = &self.awaits_article {
            if url != self.base_url {
                let mut stored = false;
                for _ in 0..200 {
                    if storage.get_article(awaited).unwrap().is_some() {
                        stored = true;
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                if !stored {
                    return Err(PluginError::Extraction(format!("{} never stored", awaited)));
                }
            }
        }
        self.fetch(url, timeout)
    }
}

fn options(strategy: Strategy) -> WorkflowOptions {
    WorkflowOptions {
        strategy,
        modules: Vec::new(),
        crawl_links: true,
        crawl_articles: true,
        max_articles: None,
        delay: DelayRange::none(),
        timeout: Duration::from_secs(5),
    }
}

/// Runs a workflow over the given plugins against a fresh in-memory store
fn run_with(
    storage: &Arc<SqliteStorage>,
    sites: &[Arc<MockSite>],
    options: WorkflowOptions,
) -> RunStatistics {
    // Empty module root; every site is registered directly
    let root = TempDir::new().unwrap();
    let mut registry = ModuleRegistry::new(root.path(), "TestBot/1.0");
    for site in sites {
        registry.register(Arc::clone(site) as Arc<dyn SitePlugin>);
    }

    let store: Arc<dyn Storage> = Arc::clone(storage) as Arc<dyn Storage>;
    let mut workflow = Workflow::new(registry, store, options);
    workflow.run().unwrap()
}

fn run(sites: Vec<MockSite>, options: WorkflowOptions) -> (RunStatistics, Arc<SqliteStorage>) {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let sites: Vec<_> = sites.into_iter().map(Arc::new).collect();
    let stats = run_with(&storage, &sites, options);
    (stats, storage)
}

#[test]
fn test_strategies_produce_equivalent_results() {
    for strategy in STRATEGIES {
        let (stats, storage) = run(
            vec![MockSite::new("alpha", 3), MockSite::new("beta", 3)],
            options(strategy),
        );

        assert_eq!(stats.outcome, RunOutcome::Completed, "{}", strategy);
        assert!(stats.errors.is_empty(), "{}: {:?}", strategy, stats.errors);
        assert_eq!(stats.modules_discovered, 2);
        assert_eq!(stats.modules_valid, 2);
        assert_eq!(stats.links_crawled, 6);
        assert_eq!(stats.links_stored, 6);
        assert_eq!(stats.articles_crawled, 6);
        assert_eq!(stats.articles_stored, 6);

        let store = storage.get_statistics().unwrap();
        assert_eq!(store.total_links, 6);
        assert_eq!(store.links_with_status(LinkStatus::Completed), 6);
        assert_eq!(store.total_articles, 6);
        assert_eq!(store.articles_by_source.get("alpha"), Some(&3));
        assert_eq!(store.articles_by_source.get("beta"), Some(&3));
        assert_eq!(stats.store, store);
    }
}

#[test]
fn test_stored_article_fields() {
    let site = MockSite::new("alpha", 1);
    let url = site.url(0);
    let (_, storage) = run(vec![site], options(Strategy::WorkerPool { workers: 1 }));

    let article = storage.get_article(&url).unwrap().unwrap();
    assert_eq!(article.title, "Story 0 from alpha");
    assert_eq!(article.content, "Body 0");
    assert_eq!(article.pub_date, "2024-01-01");
    assert_eq!(article.source, "alpha");
    assert_eq!(storage.get_link_status(&url).unwrap(), Some(LinkStatus::Completed));
}

#[test]
fn test_filter_selects_only_named_module() {
    for strategy in STRATEGIES {
        let mut opts = options(strategy);
        opts.modules = vec!["beta".to_string()];

        let (stats, storage) = run(
            vec![
                MockSite::new("alpha", 2),
                MockSite::new("beta", 2),
                MockSite::new("gamma", 2),
            ],
            opts,
        );

        assert_eq!(stats.outcome, RunOutcome::Completed);
        assert_eq!(stats.modules_processed, 1);
        assert_eq!(stats.links_stored, 2);

        let store = storage.get_statistics().unwrap();
        assert_eq!(store.articles_by_source.len(), 1);
        assert_eq!(store.articles_by_source.get("beta"), Some(&2));
    }
}

#[test]
fn test_unknown_filter_is_no_modules() {
    for strategy in STRATEGIES {
        let mut opts = options(strategy);
        opts.modules = vec!["missing".to_string()];

        let (stats, storage) = run(vec![MockSite::new("alpha", 2)], opts);

        assert_eq!(stats.outcome, RunOutcome::NoModules);
        assert_eq!(stats.modules_processed, 0);
        assert_eq!(stats.links_crawled, 0);
        assert_eq!(stats.articles_stored, 0);
        assert!(stats.finished_at.is_some());
        assert!(stats.errors.iter().any(|e| e.contains("No modules")));
        assert_eq!(storage.get_statistics().unwrap().total_links, 0);
    }
}

#[test]
fn test_failing_module_is_isolated() {
    for strategy in STRATEGIES {
        let (stats, storage) = run(
            vec![
                MockSite::new("alpha", 3).unreachable(),
                MockSite::new("beta", 3),
            ],
            options(strategy),
        );

        assert_eq!(stats.outcome, RunOutcome::Completed);
        assert_eq!(stats.errors.len(), 1, "{}: {:?}", strategy, stats.errors);
        assert!(stats.errors[0].starts_with("alpha:"));

        let store = storage.get_statistics().unwrap();
        assert_eq!(store.total_links, 3);
        assert_eq!(store.articles_by_source.get("beta"), Some(&3));
        assert!(store.articles_by_source.get("alpha").is_none());
    }
}

#[test]
fn test_empty_title_counts_as_failure() {
    for strategy in STRATEGIES {
        let site = MockSite::new("alpha", 2).with_page(1, "   |Body text|2024-02-02");
        let failed_url = site.url(1);
        let ok_url = site.url(0);

        let (stats, storage) = run(vec![site], options(strategy));

        assert_eq!(stats.articles_crawled, 1);
        assert_eq!(stats.articles_failed, 1);
        assert_eq!(stats.articles_stored, 1);
        assert_eq!(
            storage.get_link_status(&failed_url).unwrap(),
            Some(LinkStatus::Failed)
        );
        assert_eq!(
            storage.get_link_status(&ok_url).unwrap(),
            Some(LinkStatus::Completed)
        );
        assert!(storage.get_article(&failed_url).unwrap().is_none());
    }
}

#[test]
fn test_article_fetch_failure_marks_link_failed() {
    for strategy in STRATEGIES {
        let mut site = MockSite::new("alpha", 2);
        let missing = site.url(0);
        site.pages.remove(&missing);

        let (stats, storage) = run(vec![site], options(strategy));

        assert_eq!(stats.articles_failed, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("503"));
        assert_eq!(
            storage.get_link_status(&missing).unwrap(),
            Some(LinkStatus::Failed)
        );
    }
}

#[test]
fn test_cooperative_falls_back_to_blocking_fetch() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let site = Arc::new(MockSite::new("alpha", 3).blocking_only());

    let stats = run_with(
        &storage,
        &[Arc::clone(&site)],
        options(Strategy::Cooperative { limit: 1 }),
    );

    assert!(stats.errors.is_empty(), "{:?}", stats.errors);
    assert_eq!(stats.articles_stored, 3);
    // Index page plus three articles, all through the blocking capability
    assert_eq!(site.fetches.load(Ordering::SeqCst), 4);
}

#[test]
fn test_panicking_extractor_fails_only_its_link() {
    let strategies = [
        Strategy::WorkerPool { workers: 1 },
        Strategy::WorkerPool { workers: 3 },
        Strategy::Cooperative { limit: 1 },
        Strategy::Cooperative { limit: 2 },
    ];

    for strategy in strategies {
        let site = MockSite::new("alpha", 3).with_page(2, "PANIC");
        let crashed_url = site.url(2);

        let (stats, storage) = run(vec![site], options(strategy));

        assert_eq!(stats.outcome, RunOutcome::Completed);
        assert_eq!(stats.articles_crawled, 2, "{}", strategy);
        assert_eq!(stats.articles_failed, 1, "{}", strategy);
        assert_eq!(stats.articles_stored, 2, "{}", strategy);
        assert_eq!(stats.errors.len(), 1, "{}: {:?}", strategy, stats.errors);
        assert!(stats.errors[0].starts_with("alpha:"));
        assert!(stats.errors[0].contains("extractor panicked"));
        assert_eq!(
            storage.get_link_status(&crashed_url).unwrap(),
            Some(LinkStatus::Failed)
        );

        // Every completed link has its article
        let store = storage.get_statistics().unwrap();
        assert_eq!(store.links_with_status(LinkStatus::Completed), 2);
        assert_eq!(store.total_articles, 2);
        assert_eq!(store.links_with_status(LinkStatus::Pending), 0);
    }
}

#[test]
fn test_panicking_link_extractor_is_isolated() {
    for strategy in STRATEGIES {
        let (stats, storage) = run(
            vec![
                MockSite::new("alpha", 3).crashing_links(),
                MockSite::new("beta", 3),
            ],
            options(strategy),
        );

        assert_eq!(stats.outcome, RunOutcome::Completed);
        assert_eq!(stats.errors.len(), 1, "{}: {:?}", strategy, stats.errors);
        assert!(stats.errors[0].starts_with("alpha:"));
        assert!(stats.errors[0].contains("link extractor panicked"));
        assert_eq!(stats.links_stored, 3);

        let store = storage.get_statistics().unwrap();
        assert_eq!(store.articles_by_source.get("beta"), Some(&3));
        assert!(store.articles_by_source.get("alpha").is_none());
    }
}

#[test]
fn test_single_module_link_crawl_skips_delay() {
    for strategy in STRATEGIES {
        let mut opts = options(strategy);
        opts.crawl_articles = false;
        opts.delay = DelayRange::from_millis(3_000, 3_000);

        let started = Instant::now();
        let (stats, _) = run(vec![MockSite::new("alpha", 3)], opts);

        assert_eq!(stats.links_stored, 3);
        assert!(
            started.elapsed() < Duration::from_millis(2_000),
            "{}: {:?}",
            strategy,
            started.elapsed()
        );
    }
}

#[test]
fn test_cooperative_stores_each_module_when_its_tasks_finish() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let alpha = MockSite::new("alpha", 3);
    let beta = MockSite::new("beta", 3).awaiting_article(&storage, alpha.url(0));
    let sites = vec![Arc::new(alpha), Arc::new(beta)];

    let stats = run_with(&storage, &sites, options(Strategy::Cooperative { limit: 4 }));

    assert!(stats.errors.is_empty(), "{:?}", stats.errors);
    assert_eq!(stats.articles_stored, 6);
    let store = storage.get_statistics().unwrap();
    assert_eq!(store.articles_by_source.get("alpha"), Some(&3));
    assert_eq!(store.articles_by_source.get("beta"), Some(&3));
}

#[test]
fn test_invalid_module_is_recorded_and_skipped() {
    for strategy in STRATEGIES {
        let (stats, storage) = run(
            vec![
                MockSite::new("alpha", 2).without_domain(),
                MockSite::new("beta", 2),
            ],
            options(strategy),
        );

        assert_eq!(stats.modules_discovered, 2);
        assert_eq!(stats.modules_valid, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("Module alpha is invalid"));
        assert!(stats.errors[0].contains("Missing base-domain"));
        assert_eq!(storage.get_statistics().unwrap().total_links, 2);
    }
}

#[test]
fn test_max_articles_caps_each_module() {
    for strategy in STRATEGIES {
        let mut opts = options(strategy);
        opts.max_articles = Some(2);

        let (stats, storage) = run(vec![MockSite::new("alpha", 5)], opts);

        assert_eq!(stats.links_stored, 5);
        assert_eq!(stats.articles_stored, 2);
        let store = storage.get_statistics().unwrap();
        assert_eq!(store.links_with_status(LinkStatus::Completed), 2);
        assert_eq!(store.links_with_status(LinkStatus::Pending), 3);
    }
}

#[test]
fn test_phases_can_run_separately() {
    for strategy in STRATEGIES {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let sites = vec![Arc::new(MockSite::new("alpha", 3))];

        let mut links_only = options(strategy);
        links_only.crawl_articles = false;
        let first = run_with(&storage, &sites, links_only);
        assert_eq!(first.links_stored, 3);
        assert_eq!(first.articles_crawled, 0);
        assert_eq!(
            storage.get_pending_links(Some("alpha"), None).unwrap().len(),
            3
        );

        let mut articles_only = options(strategy);
        articles_only.crawl_links = false;
        let second = run_with(&storage, &sites, articles_only);
        assert_eq!(second.links_crawled, 0);
        assert_eq!(second.articles_stored, 3);
        assert!(storage.get_pending_links(None, None).unwrap().is_empty());
    }
}

#[test]
fn test_repeated_run_stores_no_duplicate_links() {
    let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
    let sites = vec![Arc::new(MockSite::new("alpha", 3))];

    let first = run_with(&storage, &sites, options(Strategy::WorkerPool { workers: 2 }));
    let second = run_with(&storage, &sites, options(Strategy::WorkerPool { workers: 2 }));

    assert_eq!(first.links_stored, 3);
    assert_eq!(second.links_crawled, 3);
    assert_eq!(second.links_stored, 0);
    // Completed links are not crawled again
    assert_eq!(second.articles_crawled, 0);
    assert_eq!(storage.get_statistics().unwrap().total_articles, 3);
}

#[test]
fn test_cancelled_run_launches_no_work() {
    for strategy in STRATEGIES {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let site = Arc::new(MockSite::new("alpha", 3));
        let root = TempDir::new().unwrap();
        let mut registry = ModuleRegistry::new(root.path(), "TestBot/1.0");
        registry.register(Arc::clone(&site) as Arc<dyn SitePlugin>);

        let store: Arc<dyn Storage> = Arc::clone(&storage) as Arc<dyn Storage>;
        let mut workflow = Workflow::new(registry, store, options(strategy));
        workflow.cancel_flag().store(true, Ordering::SeqCst);
        let stats = workflow.run().unwrap();

        assert_eq!(stats.outcome, RunOutcome::Interrupted);
        assert_eq!(stats.links_crawled, 0);
        assert_eq!(site.fetches.load(Ordering::SeqCst), 0);
    }
}
