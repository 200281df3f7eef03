//! News-Harvester main entry point
//!
//! This is the command-line interface for the News-Harvester crawler.

use anyhow::Context;
use clap::Parser;
use news_harvester::config::{load_config_with_hash, validate, ConcurrencyMode, Config};
use news_harvester::crawler::{RunOutcome, Workflow, WorkflowOptions};
use news_harvester::output::{print_module_list, print_run_summary, print_store_statistics};
use news_harvester::registry::ModuleRegistry;
use news_harvester::storage::{open_storage, Storage};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// News-Harvester: a plugin-driven news crawler
///
/// Discovers site modules, crawls each module's index page for article links, extracts the
/// articles and stores links and articles in SQLite.
#[derive(Parser, Debug)]
#[command(name = "news-harvester")]
#[command(version)]
#[command(about = "A plugin-driven news crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Storage backend: sqlite or memory
    #[arg(long, value_name = "BACKEND")]
    backend: Option<String>,

    /// SQLite database file
    #[arg(long, value_name = "PATH")]
    database_path: Option<String>,

    /// Directory scanned for site modules
    #[arg(long, value_name = "DIR")]
    modules_dir: Option<String>,

    /// Only crawl these modules (comma separated)
    #[arg(short, long, value_delimiter = ',', value_name = "NAMES")]
    modules: Vec<String>,

    /// Skip the link discovery phase
    #[arg(long)]
    no_links: bool,

    /// Skip the article extraction phase
    #[arg(long)]
    no_articles: bool,

    /// Maximum articles crawled per module
    #[arg(long, value_name = "N")]
    max_articles: Option<usize>,

    /// Concurrency strategy
    #[arg(long, value_enum)]
    mode: Option<ConcurrencyMode>,

    /// Worker threads for the threads mode
    #[arg(long, value_name = "N")]
    max_workers: Option<u32>,

    /// In-flight fetch limit for the async mode
    #[arg(long, value_name = "N")]
    max_concurrent: Option<u32>,

    /// Minimum politeness delay in milliseconds
    #[arg(long, value_name = "MS")]
    delay_min_ms: Option<u64>,

    /// Maximum politeness delay in milliseconds
    #[arg(long, value_name = "MS")]
    delay_max_ms: Option<u64>,

    /// Fetch timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// List discovered modules and exit
    #[arg(long, conflicts_with_all = ["stats", "dry_run"])]
    list_modules: bool,

    /// Show store statistics and exit
    #[arg(long, conflicts_with_all = ["list_modules", "dry_run"])]
    stats: bool,

    /// Check storage and modules without crawling
    #[arg(long, conflicts_with_all = ["list_modules", "stats"])]
    dry_run: bool,

    /// With --dry-run, fetch every valid module's index page once
    #[arg(long, requires = "dry_run")]
    check_connectivity: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_effective_config(&cli)?;

    if cli.list_modules {
        handle_list_modules(&config);
        Ok(ExitCode::SUCCESS)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(ExitCode::SUCCESS)
    } else if cli.dry_run {
        handle_dry_run(&config, config_hash.as_deref(), cli.check_connectivity)?;
        Ok(ExitCode::SUCCESS)
    } else {
        handle_crawl(config)
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("news_harvester=info,warn"),
            1 => EnvFilter::new("news_harvester=debug,info"),
            2 => EnvFilter::new("news_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file if one was given, applies command-line overrides and validates
fn load_effective_config(cli: &Cli) -> anyhow::Result<(Config, Option<String>)> {
    let (mut config, hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    if let Some(backend) = &cli.backend {
        config.storage.backend = backend.clone();
    }
    if let Some(path) = &cli.database_path {
        config.storage.database_path = path.clone();
    }
    if let Some(dir) = &cli.modules_dir {
        config.modules.directory = dir.clone();
    }
    if !cli.modules.is_empty() {
        config.modules.enabled = cli.modules.clone();
    }
    if cli.no_links {
        config.crawler.crawl_links = false;
    }
    if cli.no_articles {
        config.crawler.crawl_articles = false;
    }
    if cli.max_articles.is_some() {
        config.crawler.max_articles = cli.max_articles;
    }
    if let Some(mode) = cli.mode {
        config.crawler.mode = mode;
    }
    if let Some(workers) = cli.max_workers {
        config.crawler.max_workers = workers;
    }
    if let Some(limit) = cli.max_concurrent {
        config.crawler.max_concurrent = limit;
    }
    if let Some(ms) = cli.delay_min_ms {
        config.crawler.delay_min_ms = ms;
    }
    if let Some(ms) = cli.delay_max_ms {
        config.crawler.delay_max_ms = ms;
    }
    if let Some(secs) = cli.timeout {
        config.crawler.timeout_secs = secs;
    }

    validate(&config).context("Invalid configuration")?;
    Ok((config, hash))
}

fn build_registry(config: &Config) -> ModuleRegistry {
    ModuleRegistry::new(
        &config.modules.directory,
        config.user_agent.header_value(),
    )
}

/// Handles the --list-modules mode
fn handle_list_modules(config: &Config) {
    let mut registry = build_registry(config);
    registry.discover();
    print_module_list(&registry);
}

/// Handles the --stats mode: shows statistics from the store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Backend: {}", config.storage.backend);
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(&config.storage).context("Failed to open storage")?;
    let stats = storage.get_statistics()?;
    print_store_statistics(&stats);

    Ok(())
}

/// Handles the --dry-run mode: checks storage and modules without crawling
fn handle_dry_run(
    config: &Config,
    config_hash: Option<&str>,
    check_connectivity: bool,
) -> anyhow::Result<()> {
    println!("=== News-Harvester Dry Run ===\n");

    if let Some(hash) = config_hash {
        println!("Config hash: {}\n", hash);
    }

    println!("Crawler Configuration:");
    println!("  Mode: {}", config.crawler.mode);
    println!("  Max workers: {}", config.crawler.max_workers);
    println!("  Max concurrent: {}", config.crawler.max_concurrent);
    println!(
        "  Delay: {}-{}ms",
        config.crawler.delay_min_ms, config.crawler.delay_max_ms
    );
    println!("  Timeout: {}s", config.crawler.timeout_secs);
    match config.crawler.max_articles {
        Some(max) => println!("  Max articles per module: {}", max),
        None => println!("  Max articles per module: unlimited"),
    }
    println!(
        "  Phases: links={}, articles={}",
        config.crawler.crawl_links, config.crawler.crawl_articles
    );

    println!("\nStorage:");
    println!("  Backend: {}", config.storage.backend);
    println!("  Database: {}", config.storage.database_path);
    let storage = open_storage(&config.storage).context("Failed to open storage")?;
    let store = storage.get_statistics()?;
    println!(
        "  ✓ Connected ({} links, {} articles)",
        store.total_links, store.total_articles
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    let mut registry = build_registry(config);
    registry.discover();
    println!();
    print_module_list(&registry);

    if check_connectivity {
        let timeout = Duration::from_secs(config.crawler.timeout_secs);
        println!("\nConnectivity:");
        for module in registry.valid_modules() {
            let (ok, message) = registry.test_connectivity(&module.name, timeout);
            let marker = if ok { "✓" } else { "✗" };
            println!("  {} {}: {}", marker, module.name, message);
        }
    }

    let selected = registry
        .valid_modules()
        .into_iter()
        .filter(|m| config.modules.enabled.is_empty() || config.modules.enabled.contains(&m.name))
        .count();
    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} modules", selected);

    Ok(())
}

/// Handles the main crawl operation
fn handle_crawl(config: Config) -> anyhow::Result<ExitCode> {
    let storage: Arc<dyn Storage> =
        Arc::new(open_storage(&config.storage).context("Failed to open storage")?);

    let options = WorkflowOptions::from_config(&config);
    let mut workflow = Workflow::new(build_registry(&config), storage, options);
    install_interrupt_handler(workflow.cancel_flag());

    let stats = workflow.run()?;
    print_run_summary(&stats);

    match stats.outcome {
        RunOutcome::Completed => Ok(ExitCode::SUCCESS),
        RunOutcome::NoModules => {
            tracing::error!("No modules available to crawl");
            Ok(ExitCode::FAILURE)
        }
        RunOutcome::Interrupted => Ok(ExitCode::from(130)),
    }
}

/// Sets `flag` on Ctrl-C so the workflow stops launching new work
fn install_interrupt_handler(flag: Arc<AtomicBool>) {
    let spawned = std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("Interrupt handling unavailable: {}", e);
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing in-flight work");
                    flag.store(true, Ordering::SeqCst);
                }
            });
        });

    if let Err(e) = spawned {
        tracing::warn!("Interrupt handling unavailable: {}", e);
    }
}
