//! State module for tracking crawl progress
//!
//! A link moves through a single status flag: it is discovered as `pending`, and one
//! article-crawl attempt settles it as either `completed` or `failed`.

mod link_status;

pub use link_status::LinkStatus;
