//! HTTP fetcher implementation
//!
//! This module builds the HTTP clients used by selector plugins and performs the actual
//! page fetches, for both the async and the blocking capability.

use crate::{PluginError, PluginResult};
use std::time::Duration;

/// Builds an async HTTP client with the given user agent
pub fn build_http_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Builds a blocking HTTP client with the given user agent
///
/// Must not be built or dropped on a tokio worker thread.
pub fn build_blocking_client(
    user_agent: &str,
) -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page body asynchronously
///
/// Non-success statuses are errors; an empty body is `Ok(None)`.
pub async fn fetch_body(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> PluginResult<Option<String>> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|source| http_error(url, source))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PluginError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|source| http_error(url, source))?;

    Ok(non_empty(body))
}

/// Fetches a page body on the current thread
pub fn fetch_body_blocking(
    client: &reqwest::blocking::Client,
    url: &str,
    timeout: Duration,
) -> PluginResult<Option<String>> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .map_err(|source| http_error(url, source))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PluginError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().map_err(|source| http_error(url, source))?;

    Ok(non_empty(body))
}

fn http_error(url: &str, source: reqwest::Error) -> PluginError {
    PluginError::Http {
        url: url.to_string(),
        source,
    }
}

fn non_empty(body: String) -> Option<String> {
    if body.trim().is_empty() {
        None
    } else {
        Some(body)
    }
}
