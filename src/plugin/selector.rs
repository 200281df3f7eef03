//! Selector-driven site plugin
//!
//! Extraction rules come from the `[selectors]` table of a module manifest:
//! - Links: every `href` matched by a link selector, resolved against the base URL
//! - Title: the first non-empty match, selectors tried in priority order
//! - Content: text of the first matching container, minus `remove` descendants
//! - Publish date: normalized to `YYYY-MM-DD HH:MM:SS` when a date can be recognized

use crate::plugin::fetcher::{
    build_blocking_client, build_http_client, fetch_body, fetch_body_blocking,
};
use crate::plugin::manifest::ModuleManifest;
use crate::plugin::{ArticleContent, AsyncFetch, Capabilities, SitePlugin};
use crate::{PluginError, PluginResult};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

/// How many leading words of the page body are searched for a date
const DATE_SCAN_WORDS: usize = 400;

const DATE_PATTERN: &str = r"(\d{4})\s*[年./-]\s*(\d{1,2})\s*[月./-]\s*(\d{1,2})";
const TIME_PATTERN: &str = r"(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?";

/// A site plugin whose extraction is described by CSS selectors
pub struct SelectorPlugin {
    name: String,
    display_name: String,
    base_url: String,
    base: Option<Url>,
    base_domain: String,
    async_fetch: bool,
    user_agent: String,
    links: Vec<Selector>,
    title: Vec<Selector>,
    content: Vec<Selector>,
    pub_date: Vec<Selector>,
    remove: Vec<Selector>,
    body: Selector,
    dates: DateNormalizer,
    client: OnceLock<reqwest::Client>,
    blocking_client: OnceLock<reqwest::blocking::Client>,
}

impl SelectorPlugin {
    /// Builds a plugin from a parsed manifest
    ///
    /// Selectors are compiled up front so a typo fails the module at discovery time.
    /// HTTP clients are created on first fetch.
    pub fn from_manifest(
        name: &str,
        manifest: &ModuleManifest,
        user_agent: &str,
    ) -> PluginResult<Self> {
        let base = if manifest.base_url.trim().is_empty() {
            None
        } else {
            let parsed = Url::parse(manifest.base_url.trim()).map_err(|e| PluginError::BaseUrl {
                url: manifest.base_url.clone(),
                message: e.to_string(),
            })?;
            Some(parsed)
        };

        let selectors = &manifest.selectors;

        Ok(Self {
            name: name.to_string(),
            display_name: manifest
                .display_name
                .clone()
                .unwrap_or_else(|| name.to_string()),
            base_url: manifest.base_url.trim().to_string(),
            base,
            base_domain: manifest.base_domain.trim().to_string(),
            async_fetch: manifest.async_fetch,
            user_agent: user_agent.to_string(),
            links: compile(&selectors.links)?,
            title: compile(&selectors.title)?,
            content: compile(&selectors.content)?,
            pub_date: compile(&selectors.pub_date)?,
            remove: compile(&selectors.remove)?,
            body: compile_one("body")?,
            dates: DateNormalizer::new()?,
            client: OnceLock::new(),
            blocking_client: OnceLock::new(),
        })
    }

    fn http_client(&self) -> PluginResult<&reqwest::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = build_http_client(&self.user_agent).map_err(PluginError::Client)?;
        Ok(self.client.get_or_init(|| client))
    }

    fn blocking_client(&self) -> PluginResult<&reqwest::blocking::Client> {
        if let Some(client) = self.blocking_client.get() {
            return Ok(client);
        }
        let client = build_blocking_client(&self.user_agent).map_err(PluginError::Client)?;
        Ok(self.blocking_client.get_or_init(|| client))
    }

    fn extract_title(&self, document: &Html) -> String {
        self.title
            .iter()
            .flat_map(|selector| document.select(selector))
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|title| !title.is_empty())
            .unwrap_or_default()
    }

    fn extract_body(&self, document: &Html) -> String {
        let container = self
            .content
            .iter()
            .find_map(|selector| document.select(selector).next());

        match container {
            Some(container) => self.container_text(container),
            None => String::new(),
        }
    }

    /// Text of a container with `remove`-matched subtrees left out, one trimmed line per line
    fn container_text(&self, container: ElementRef<'_>) -> String {
        let removed: Vec<_> = self
            .remove
            .iter()
            .flat_map(|selector| container.select(selector))
            .map(|element| element.id())
            .collect();

        let mut raw = String::new();
        for node in container.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            if node.ancestors().any(|ancestor| removed.contains(&ancestor.id())) {
                continue;
            }
            raw.push_str(text);
        }

        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Publish date from the date selectors, else from the head of the page body, else today
    fn extract_pub_date(&self, document: &Html) -> String {
        let raw = self
            .pub_date
            .iter()
            .flat_map(|selector| document.select(selector))
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|text| !text.is_empty());

        if let Some(date) = raw.as_deref().and_then(|raw| self.dates.normalize(raw)) {
            return date;
        }

        let head = document
            .select(&self.body)
            .next()
            .map(|body| {
                body.text()
                    .flat_map(str::split_whitespace)
                    .take(DATE_SCAN_WORDS)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        self.dates
            .normalize(&head)
            .or(raw)
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string())
    }
}

impl SitePlugin for SelectorPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn base_domain(&self) -> &str {
        &self.base_domain
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            fetch: true,
            extract_links: !self.links.is_empty(),
            extract_content: !self.title.is_empty(),
            async_fetch: self.async_fetch,
        }
    }

    fn fetch(&self, url: &str, timeout: Duration) -> PluginResult<Option<String>> {
        let client = self.blocking_client()?;
        fetch_body_blocking(client, url, timeout)
    }

    fn extract_links(&self, body: &str) -> PluginResult<Vec<String>> {
        if self.links.is_empty() {
            return Err(PluginError::MissingCapability("extract_links"));
        }

        let document = Html::parse_document(body);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for selector in &self.links {
            for element in document.select(selector) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                if let Some(url) = resolve_link(href, self.base.as_ref()) {
                    if seen.insert(url.clone()) {
                        links.push(url);
                    }
                }
            }
        }

        Ok(links)
    }

    fn extract_content(&self, body: &str) -> PluginResult<Option<ArticleContent>> {
        if self.title.is_empty() {
            return Err(PluginError::MissingCapability("extract_content"));
        }

        let document = Html::parse_document(body);
        let title = self.extract_title(&document);
        let content = self.extract_body(&document);

        if title.is_empty() && content.is_empty() {
            return Ok(None);
        }

        let pub_date = self.extract_pub_date(&document);

        Ok(Some(ArticleContent {
            title,
            content,
            pub_date,
        }))
    }

    fn as_async(&self) -> Option<&dyn AsyncFetch> {
        if self.async_fetch {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl AsyncFetch for SelectorPlugin {
    async fn fetch_async(&self, url: &str, timeout: Duration) -> PluginResult<Option<String>> {
        let client = self.http_client()?;
        fetch_body(client, url, timeout).await
    }
}

fn compile(selectors: &[String]) -> PluginResult<Vec<Selector>> {
    selectors.iter().map(|raw| compile_one(raw)).collect()
}

fn compile_one(raw: &str) -> PluginResult<Selector> {
    Selector::parse(raw).map_err(|e| PluginError::Selector {
        selector: raw.to_string(),
        message: e.to_string(),
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Relative links when the module has no base URL
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: Option<&Url>) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = match base_url {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };

    match resolved {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Recognizes dates such as `2024-03-05 09:30`, `2024/3/5` or `2024年3月5日 09:30`
struct DateNormalizer {
    date: Regex,
    time: Regex,
}

impl DateNormalizer {
    fn new() -> PluginResult<Self> {
        let build =
            |pattern: &str| Regex::new(pattern).map_err(|e| PluginError::Extraction(e.to_string()));
        Ok(Self {
            date: build(DATE_PATTERN)?,
            time: build(TIME_PATTERN)?,
        })
    }

    /// Formats the first recognizable date in `text` as `YYYY-MM-DD HH:MM:SS`
    ///
    /// A missing time of day becomes midnight.
    fn normalize(&self, text: &str) -> Option<String> {
        let date_caps = self.date.captures(text)?;
        let date = NaiveDate::from_ymd_opt(
            date_caps[1].parse().ok()?,
            date_caps[2].parse().ok()?,
            date_caps[3].parse().ok()?,
        )?;

        let rest = &text[date_caps.get(0)?.end()..];
        let time = self
            .time
            .captures(rest)
            .and_then(|caps| {
                let hour = caps[1].parse().ok()?;
                let minute = caps[2].parse().ok()?;
                let second = match caps.get(3) {
                    Some(s) => s.as_str().parse().ok()?,
                    None => 0,
                };
                NaiveTime::from_hms_opt(hour, minute, second)
            })
            .or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;

        Some(
            NaiveDateTime::new(date, time)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        )
    }
}
