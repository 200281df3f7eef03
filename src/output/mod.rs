//! Terminal output
//!
//! This module handles:
//! - Run summaries printed after a crawl
//! - Store statistics for `--stats`
//! - Module listings for `--list-modules`

mod modules;
pub mod stats;

pub use modules::{format_module_list, print_module_list};
pub use stats::{
    format_run_summary, format_store_statistics, print_run_summary, print_store_statistics,
};
