use serde::Deserialize;
use std::fmt;

/// Main configuration structure for News-Harvester
///
/// Every section is optional in the file; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub storage: StorageConfig,
    pub modules: ModulesConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Which concurrency strategy drives the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// Bounded pool of OS threads running blocking fetches
    Threads,

    /// Cooperative tokio tasks sharing one concurrency limiter
    Async,
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threads => f.write_str("threads"),
            Self::Async => f.write_str("async"),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Concurrency strategy
    pub mode: ConcurrencyMode,

    /// Worker pool size for the threads strategy
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Global in-flight fetch limit for the async strategy
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: u32,

    /// Lower bound of the randomized politeness delay (milliseconds)
    #[serde(rename = "delay-min-ms")]
    pub delay_min_ms: u64,

    /// Upper bound of the randomized politeness delay (milliseconds)
    #[serde(rename = "delay-max-ms")]
    pub delay_max_ms: u64,

    /// Per-request fetch timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Maximum pending links crawled per module per run
    #[serde(rename = "max-articles")]
    pub max_articles: Option<usize>,

    /// Run the link discovery phase
    #[serde(rename = "crawl-links")]
    pub crawl_links: bool,

    /// Run the article extraction phase
    #[serde(rename = "crawl-articles")]
    pub crawl_articles: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::Threads,
            max_workers: 5,
            max_concurrent: 10,
            delay_min_ms: 1000,
            delay_max_ms: 3000,
            timeout_secs: 30,
            max_articles: None,
            crawl_links: true,
            crawl_articles: true,
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend name: "sqlite" or "memory"
    pub backend: String,

    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            database_path: "db/news.db".to_string(),
        }
    }
}

/// Module discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Root directory scanned for module subdirectories
    pub directory: String,

    /// Module names to crawl; empty means every valid module
    pub enabled: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            directory: "modules".to_string(),
            enabled: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "news-harvester".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.crawler_name, self.crawler_version)
    }
}
