//! Page fetcher abstraction and a blocking HTTP implementation.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::io::config::HttpConfig;
use crate::io::html::{document_text, truncate_chars};

/// Fetch a page and return its readable text, truncated to `max_chars`.
///
/// Failures are expected to be transient; the caller decides whether to retry.
pub trait PageFetcher {
    fn fetch(&self, url: &str, timeout: Duration, max_chars: usize) -> Result<String>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(http.user_agent.clone())
            .build()
            .context("build fetch http client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url, timeout_secs = timeout.as_secs(), max_chars = max_chars))]
    fn fetch(&self, url: &str, timeout: Duration, max_chars: usize) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned {status}"));
        }
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_none_or(|value| value.contains("html"));
        let body = response
            .text()
            .with_context(|| format!("read body of {url}"))?;
        let text = extract_text(&body, is_html, max_chars);
        debug!(chars = text.chars().count(), "page fetched");
        Ok(text)
    }
}

/// Turn a response body into bounded plain text.
pub fn extract_text(body: &str, is_html: bool, max_chars: usize) -> String {
    let text = if is_html {
        document_text(body)
    } else {
        body.trim().to_string()
    };
    truncate_chars(&text, max_chars).to_string()
}
