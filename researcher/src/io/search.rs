//! Search provider abstraction and a DuckDuckGo HTML-endpoint implementation.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::io::config::{HttpConfig, SafeSearch, SearchConfig, TimeWindow};
use crate::io::html::inline_text;

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Parameters for one search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub region: String,
    pub safesearch: SafeSearch,
    pub time_window: Option<TimeWindow>,
    pub max_results: u32,
}

impl SearchQuery {
    pub fn new(query: &str, config: &SearchConfig) -> Self {
        Self {
            query: query.to_string(),
            region: config.region.clone(),
            safesearch: config.safesearch,
            time_window: config.time_window,
            max_results: config.max_results,
        }
    }
}

/// One raw search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

pub trait SearchProvider {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;
}

/// Blocking client for `html.duckduckgo.com`.
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.clone())
            .build()
            .context("build search http client")?;
        Ok(Self {
            client,
            endpoint: DDG_HTML_ENDPOINT.to_string(),
        })
    }

    /// Build the request URL for `query`.
    pub fn request_url(&self, query: &SearchQuery) -> Result<Url> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.query.clone()),
            ("kl", query.region.clone()),
            ("kp", safesearch_param(query.safesearch).to_string()),
        ];
        if let Some(window) = query.time_window {
            params.push(("df", time_window_param(window).to_string()));
        }
        Url::parse_with_params(&self.endpoint, &params)
            .with_context(|| format!("build search url for {:?}", query.query))
    }
}

impl SearchProvider for DuckDuckGoSearch {
    #[instrument(skip_all, fields(query = %query.query, max_results = query.max_results))]
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let url = self.request_url(query)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("search endpoint returned {status}"));
        }
        let body = response.text().context("read search response body")?;
        let mut hits = parse_results(&body);
        hits.truncate(query.max_results as usize);
        debug!(hits = hits.len(), "search completed");
        Ok(hits)
    }
}

fn safesearch_param(level: SafeSearch) -> &'static str {
    match level {
        SafeSearch::Strict => "1",
        SafeSearch::Moderate => "-1",
        SafeSearch::Off => "-2",
    }
}

fn time_window_param(window: TimeWindow) -> &'static str {
    match window {
        TimeWindow::Day => "d",
        TimeWindow::Week => "w",
        TimeWindow::Month => "m",
        TimeWindow::Year => "y",
    }
}

static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a\b([^>]*class="[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a>"#)
        .expect("result link regex is valid")
});
static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<[a-z]+\b[^>]*class="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td|span)\s*>"#)
        .expect("snippet regex is valid")
});
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*)""#).expect("href regex is valid"));

/// Parse result blocks from a DuckDuckGo HTML results page.
///
/// Each title link starts a block; the snippet is looked up between that link
/// and the next one so results without a snippet do not shift the pairing.
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let links: Vec<_> = RESULT_LINK_RE.captures_iter(html).collect();
    let mut hits = Vec::with_capacity(links.len());
    for (idx, caps) in links.iter().enumerate() {
        let whole = caps.get(0).expect("group 0 always matches");
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let title = inline_text(caps.get(2).map_or("", |m| m.as_str()));
        let href = HREF_RE
            .captures(attrs)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let block_end = links
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let block = &html[whole.end()..block_end];
        let snippet = SNIPPET_RE
            .captures(block)
            .and_then(|c| c.get(1))
            .map(|m| inline_text(m.as_str()))
            .unwrap_or_default();

        hits.push(SearchHit {
            url: resolve_result_url(href),
            title,
            snippet,
        });
    }
    hits
}

/// Unwrap DuckDuckGo's `/l/?uddg=<target>` redirect links.
///
/// Unparseable hrefs come back unchanged (possibly empty); the Research stage
/// skips sources with an empty URL.
pub fn resolve_result_url(href: &str) -> String {
    let href = crate::io::html::decode_entities(href.trim());
    if href.is_empty() {
        return href;
    }
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.clone()
    };
    let Ok(parsed) = Url::parse(&absolute) else {
        return href;
    };
    if parsed.path().starts_with("/l/") {
        if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "uddg") {
            return target.into_owned();
        }
    }
    absolute
}
