//! Crawl orchestration
//!
//! This module contains the workflow that drives a crawl run:
//! - Module discovery, validation and filtering
//! - Link discovery from each module's index page
//! - Article extraction with per-link status tracking
//! - Two interchangeable concurrency strategies producing the same persisted results

mod attempt;
mod cooperative;
mod delay;
mod pool;
mod stats;
mod workflow;

pub use attempt::LinkOutcome;
pub use delay::DelayRange;
pub use stats::{RunOutcome, RunStatistics};
pub use workflow::{Strategy, Workflow, WorkflowOptions};
