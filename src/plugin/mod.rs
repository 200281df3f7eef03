//! Site plugin interface
//!
//! A site plugin adapts one news source. It knows how to fetch a page body, how to pull
//! article links out of the source's index page, and how to turn an article page into
//! structured content. Fetching asynchronously is an optional extra capability.
//!
//! # Components
//!
//! - `SitePlugin`: the blocking capability set every plugin exposes
//! - `AsyncFetch`: optional non-blocking fetch, used by the cooperative strategy
//! - `SelectorPlugin`: a generic plugin driven by CSS selectors from a `module.toml`

mod fetcher;
mod manifest;
mod selector;

pub use fetcher::{build_blocking_client, build_http_client, fetch_body, fetch_body_blocking};
pub use manifest::{ModuleManifest, SelectorSet, MANIFEST_FILE};
pub use selector::SelectorPlugin;

use crate::PluginResult;
use async_trait::async_trait;
use std::time::Duration;

/// Structured content extracted from one article page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleContent {
    pub title: String,
    pub content: String,
    pub pub_date: String,
}

impl ArticleContent {
    /// An extraction only counts when it produced a title
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Which capabilities a plugin actually provides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub fetch: bool,
    pub extract_links: bool,
    pub extract_content: bool,
    pub async_fetch: bool,
}

impl Capabilities {
    /// All mandatory capabilities present
    pub fn complete(async_fetch: bool) -> Self {
        Self {
            fetch: true,
            extract_links: true,
            extract_content: true,
            async_fetch,
        }
    }

    /// Names of the mandatory capabilities that are missing
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.fetch {
            missing.push("fetch");
        }
        if !self.extract_links {
            missing.push("extract_links");
        }
        if !self.extract_content {
            missing.push("extract_content");
        }
        missing
    }
}

/// The capability set of a crawlable news source
///
/// Methods are blocking. The workflow calls them from worker threads, or from tokio's
/// blocking pool when the cooperative strategy has no async fetch to use.
pub trait SitePlugin: Send + Sync {
    /// Unique module name
    fn name(&self) -> &str;

    /// Human-readable source name
    fn display_name(&self) -> &str {
        self.name()
    }

    /// Index page crawled for article links
    fn base_url(&self) -> &str;

    /// Domain (or origin) the source publishes under
    fn base_domain(&self) -> &str;

    /// Capabilities this plugin provides
    fn capabilities(&self) -> Capabilities {
        Capabilities::complete(self.as_async().is_some())
    }

    /// Fetches a page body; `Ok(None)` means the page came back empty
    fn fetch(&self, url: &str, timeout: Duration) -> PluginResult<Option<String>>;

    /// Extracts absolute article urls from an index page body
    fn extract_links(&self, body: &str) -> PluginResult<Vec<String>>;

    /// Extracts article content; `Ok(None)` means nothing usable was found
    fn extract_content(&self, body: &str) -> PluginResult<Option<ArticleContent>>;

    /// The optional non-blocking fetch capability
    fn as_async(&self) -> Option<&dyn AsyncFetch> {
        None
    }
}

/// Non-blocking fetch capability
#[async_trait]
pub trait AsyncFetch: Send + Sync {
    /// Same contract as [`SitePlugin::fetch`]
    async fn fetch_async(&self, url: &str, timeout: Duration) -> PluginResult<Option<String>>;
}
