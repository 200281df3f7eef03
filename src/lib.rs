//! News-Harvester: a plugin-driven news article crawler
//!
//! This crate discovers site modules from a directory, crawls each module's index page for
//! article links, extracts article content, and persists links and articles into SQLite.
//! Crawls run either on a bounded thread pool or as cooperative tokio tasks.

pub mod config;
pub mod crawler;
pub mod output;
pub mod plugin;
pub mod registry;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for News-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("No modules available to crawl")]
    NoModules,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised by a site plugin while fetching or extracting
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid base URL '{url}': {message}")]
    BaseUrl { url: String, message: String },

    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Capability not provided: {0}")]
    MissingCapability(&'static str),

    #[error("Blocking fetch task failed: {0}")]
    Join(String),

    #[error("Plugin panicked: {0}")]
    Panicked(String),
}

/// Errors raised while loading a module candidate
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read module manifest {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse module manifest {path}: {source}")]
    Manifest {
        path: String,
        source: toml::de::Error,
    },

    #[error("Failed to build module {name}: {source}")]
    Plugin { name: String, source: PluginError },

    #[error("Module directory does not exist: {0}")]
    MissingDirectory(String),

    #[error("Module {0} does not exist")]
    UnknownModule(String),
}

/// Result type alias for News-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for plugin calls
pub type PluginResult<T> = std::result::Result<T, PluginError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{RunOutcome, RunStatistics, Strategy, Workflow};
pub use plugin::{ArticleContent, AsyncFetch, Capabilities, SitePlugin};
pub use registry::{ModuleDescriptor, ModuleRegistry};
pub use state::LinkStatus;
pub use storage::{Article, SqliteStorage, Storage};
