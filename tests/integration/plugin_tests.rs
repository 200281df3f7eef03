//! Integration tests for selector modules
//!
//! These tests use wiremock to serve index and article pages and exercise the HTTP side of
//! the selector plugin, the connectivity probe and a full workflow run over a module loaded
//! from disk.

use news_harvester::crawler::{DelayRange, RunOutcome, Strategy, Workflow, WorkflowOptions};
use news_harvester::plugin::{ModuleManifest, SelectorPlugin, SitePlugin};
use news_harvester::registry::ModuleRegistry;
use news_harvester::storage::{SqliteStorage, Storage};
use news_harvester::{LinkStatus, PluginError};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn manifest_toml(base_url: &str) -> String {
    format!(
        r#"
display-name = "Mock News"
base-url = "{base_url}/"
base-domain = "127.0.0.1"

[selectors]
links = ["div.list h4 > a"]
title = ["div.article h1", "h1", "title"]
content = ["div#the_content"]
pub-date = ["span.date"]
remove = ["script", "div.ad"]
"#
    )
}

fn plugin_for(base_url: &str) -> SelectorPlugin {
    let manifest = ModuleManifest::from_toml(&manifest_toml(base_url)).unwrap();
    SelectorPlugin::from_manifest("mock_news", &manifest, "TestBot/1.0").unwrap()
}

fn index_page() -> String {
    r#"<html><body>
        <div class="nav"><a href="/about">About</a></div>
        <div class="list">
            <h4><a href="/news/1.html">One</a></h4>
            <h4><a href="/news/2.html">Two</a></h4>
            <h4><a href="news/3.html">Three</a></h4>
            <h4><a href="/news/1.html">One again</a></h4>
        </div>
    </body></html>"#
        .to_string()
}

fn article_page(n: usize) -> String {
    format!(
        r#"<html><head><title>Mock News</title></head><body>
        <div class="article"><h1>Headline {n}</h1></div>
        <span class="date">2024-05-0{n} 08:15</span>
        <div id="the_content">
            <p>Paragraph one of story {n}.</p>
            <script>track();</script>
            <div class="ad">Advertisement</div>
            <p>Paragraph two.</p>
        </div>
    </body></html>"#
    )
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page()))
        .mount(server)
        .await;

    for n in 1..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/news/{}.html", n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_page(n)))
            .mount(server)
            .await;
    }
}

fn write_module(root: &Path, base_url: &str) {
    let dir = root.join("mock_news");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("module.toml"), manifest_toml(base_url)).unwrap();
}

#[tokio::test]
async fn test_async_fetch_and_extract() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let plugin = plugin_for(&server.uri());
    let fetcher = plugin.as_async().unwrap();

    let index = fetcher
        .fetch_async(&format!("{}/", server.uri()), TIMEOUT)
        .await
        .unwrap()
        .unwrap();
    let links = plugin.extract_links(&index).unwrap();
    assert_eq!(
        links,
        vec![
            format!("{}/news/1.html", server.uri()),
            format!("{}/news/2.html", server.uri()),
            format!("{}/news/3.html", server.uri()),
        ]
    );

    let body = fetcher.fetch_async(&links[1], TIMEOUT).await.unwrap().unwrap();
    let content = plugin.extract_content(&body).unwrap().unwrap();
    assert_eq!(content.title, "Headline 2");
    assert_eq!(content.content, "Paragraph one of story 2.\nParagraph two.");
    assert_eq!(content.pub_date, "2024-05-02 08:15:00");
}

#[tokio::test]
async fn test_fetch_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "TestBot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let plugin = plugin_for(&server.uri());
    let body = plugin
        .as_async()
        .unwrap()
        .fetch_async(&format!("{}/", server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(body.as_deref(), Some("<html>ok</html>"));
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let plugin = plugin_for(&server.uri());
    let result = plugin
        .as_async()
        .unwrap()
        .fetch_async(&format!("{}/missing", server.uri()), TIMEOUT)
        .await;
    assert!(matches!(result, Err(PluginError::Status { status: 404, .. })));
}

#[tokio::test]
async fn test_empty_body_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let plugin = plugin_for(&server.uri());
    let result = plugin
        .as_async()
        .unwrap()
        .fetch_async(&format!("{}/empty", server.uri()), TIMEOUT)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_blocking_fetch() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let uri = server.uri();

    // The blocking client must live and die off the async worker threads
    let content = tokio::task::spawn_blocking(move || {
        let plugin = plugin_for(&uri);
        let body = plugin
            .fetch(&format!("{}/news/3.html", uri), TIMEOUT)
            .unwrap()
            .unwrap();
        plugin.extract_content(&body).unwrap().unwrap()
    })
    .await
    .unwrap();

    assert_eq!(content.title, "Headline 3");
}

#[tokio::test]
async fn test_connectivity_probe() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let uri = server.uri();

    let (ok, message) = tokio::task::spawn_blocking(move || {
        let root = TempDir::new().unwrap();
        write_module(root.path(), &uri);
        let mut registry = ModuleRegistry::new(root.path(), "TestBot/1.0");
        registry.discover();
        registry.test_connectivity("mock_news", TIMEOUT)
    })
    .await
    .unwrap();

    assert!(ok, "{}", message);
    assert!(message.starts_with("Fetched"));
}

#[tokio::test]
async fn test_connectivity_probe_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let uri = server.uri();

    let (ok, message) = tokio::task::spawn_blocking(move || {
        let root = TempDir::new().unwrap();
        write_module(root.path(), &uri);
        let mut registry = ModuleRegistry::new(root.path(), "TestBot/1.0");
        registry.discover();
        registry.test_connectivity("mock_news", TIMEOUT)
    })
    .await
    .unwrap();

    assert!(!ok);
    assert!(message.contains("500"));
}

/// Runs a full crawl over a module loaded from disk, for each strategy
///
/// The mock server runs on its own runtime so the workflow can be driven from a plain
/// thread, the way the binary drives it.
#[test]
fn test_selector_module_end_to_end() {
    let server_runtime = tokio::runtime::Runtime::new().unwrap();
    let server = server_runtime.block_on(async {
        let server = MockServer::start().await;
        mount_site(&server).await;
        server
    });

    for strategy in [
        Strategy::WorkerPool { workers: 2 },
        Strategy::Cooperative { limit: 2 },
    ] {
        let root = TempDir::new().unwrap();
        write_module(root.path(), &server.uri());

        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let store: Arc<dyn Storage> = Arc::clone(&storage) as Arc<dyn Storage>;
        let options = WorkflowOptions {
            strategy,
            modules: Vec::new(),
            crawl_links: true,
            crawl_articles: true,
            max_articles: None,
            delay: DelayRange::none(),
            timeout: TIMEOUT,
        };

        let mut workflow = Workflow::new(
            ModuleRegistry::new(root.path(), "TestBot/1.0"),
            store,
            options,
        );
        let stats = workflow.run().unwrap();
        drop(workflow);

        assert_eq!(stats.outcome, RunOutcome::Completed, "{}", strategy);
        assert!(stats.errors.is_empty(), "{}: {:?}", strategy, stats.errors);
        assert_eq!(stats.links_stored, 3);
        assert_eq!(stats.articles_stored, 3);

        let url = format!("{}/news/1.html", server.uri());
        let article = storage.get_article(&url).unwrap().unwrap();
        assert_eq!(article.title, "Headline 1");
        assert_eq!(article.pub_date, "2024-05-01 08:15:00");
        assert_eq!(article.source, "mock_news");
        assert_eq!(
            storage.get_link_status(&url).unwrap(),
            Some(LinkStatus::Completed)
        );
    }

    server_runtime.block_on(async move { drop(server) });
}
