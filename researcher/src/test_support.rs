//! Test-only scripted collaborators and fixtures.
//!
//! Scripted collaborators record every call so tests can assert on what the
//! stages asked for, not just on the resulting state.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::config::AgentConfig;
use crate::io::fetch::PageFetcher;
use crate::io::model::LanguageModel;
use crate::io::search::{SearchHit, SearchProvider, SearchQuery};

/// One scripted model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

impl ScriptedReply {
    pub fn text(text: &str) -> Self {
        ScriptedReply::Text(text.to_string())
    }

    pub fn fail(message: &str) -> Self {
        ScriptedReply::Fail(message.to_string())
    }
}

type Responder = Box<dyn Fn(&str) -> Result<String>>;

enum ModelScript {
    Queue(RefCell<VecDeque<ScriptedReply>>),
    Responder(Responder),
}

/// Language model that replays a queue of replies or answers via a closure.
pub struct ScriptedModel {
    script: ModelScript,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedModel {
    /// Reply with each text in order; errors once the queue is exhausted.
    pub fn new(replies: Vec<&str>) -> Self {
        Self::with_replies(replies.into_iter().map(ScriptedReply::text).collect())
    }

    pub fn with_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            script: ModelScript::Queue(RefCell::new(replies.into())),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Compute each reply from the prompt.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String> + 'static,
    {
        Self {
            script: ModelScript::Responder(Box::new(responder)),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::responding(move |_| Ok(text.clone()))
    }

    /// Always fail with `message`.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::responding(move |_| Err(anyhow!(message.clone())))
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match &self.script {
            ModelScript::Queue(queue) => match queue.borrow_mut().pop_front() {
                Some(ScriptedReply::Text(text)) => Ok(text),
                Some(ScriptedReply::Fail(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("scripted model exhausted")),
            },
            ModelScript::Responder(responder) => responder(prompt),
        }
    }
}

/// Search provider returning fixed hits (or failing) and recording queries.
pub struct ScriptedSearch {
    hits: Vec<SearchHit>,
    failures_left: RefCell<u32>,
    queries: RefCell<Vec<SearchQuery>>,
}

impl ScriptedSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            failures_left: RefCell::new(0),
            queries: RefCell::new(Vec::new()),
        }
    }

    /// Fail the first `times` calls, then return `hits`.
    pub fn failing_times(hits: Vec<SearchHit>, times: u32) -> Self {
        let search = Self::new(hits);
        *search.failures_left.borrow_mut() = times;
        search
    }

    pub fn calls(&self) -> usize {
        self.queries.borrow().len()
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries.borrow().clone()
    }
}

impl SearchProvider for ScriptedSearch {
    fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        self.queries.borrow_mut().push(query.clone());
        let mut failures = self.failures_left.borrow_mut();
        if *failures > 0 {
            *failures -= 1;
            return Err(anyhow!("search unavailable"));
        }
        let mut hits = self.hits.clone();
        hits.truncate(query.max_results as usize);
        Ok(hits)
    }
}

/// Page fetcher returning `text of <url>` unless a failure is scripted for the URL.
#[derive(Default)]
pub struct ScriptedFetcher {
    failures: RefCell<HashMap<String, u32>>,
    pages: HashMap<String, String>,
    fetched: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `text` for `url`.
    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    /// Fail the first `times` fetches of `url`.
    pub fn failing(self, url: &str, times: u32) -> Self {
        self.failures.borrow_mut().insert(url.to_string(), times);
        self
    }

    /// Every attempted fetch, in order, including failed ones.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl PageFetcher for ScriptedFetcher {
    fn fetch(&self, url: &str, _timeout: Duration, max_chars: usize) -> Result<String> {
        self.fetched.borrow_mut().push(url.to_string());
        if let Some(left) = self.failures.borrow_mut().get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("connection reset fetching {url}"));
            }
        }
        let text = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| format!("text of {url}"));
        Ok(text.chars().take(max_chars).collect())
    }
}

/// Deterministic search hits `https://example.com/1..=n`.
pub fn hits(n: usize) -> Vec<SearchHit> {
    (1..=n)
        .map(|k| SearchHit {
            url: format!("https://example.com/{k}"),
            title: format!("Result {k}"),
            snippet: format!("Snippet {k}"),
        })
        .collect()
}

/// Default configuration with retry pauses removed.
pub fn test_config() -> AgentConfig {
    let mut cfg = AgentConfig::default();
    cfg.retry.pause_ms = 0;
    cfg
}

/// A config file in a temporary directory, removed on drop.
pub struct TempConfig {
    dir: TempDir,
    path: PathBuf,
}

impl TempConfig {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let path = dir.path().join("researcher.toml");
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(Self { dir, path })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
