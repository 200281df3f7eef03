//! Configuration module for News-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Command-line flags override whatever the file provides.
//!
//! # Example
//!
//! ```no_run
//! use news_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Worker pool size: {}", config.crawler.max_workers);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    ConcurrencyMode, Config, CrawlerConfig, ModulesConfig, StorageConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
