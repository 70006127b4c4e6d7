//! Run configuration: defaults, an optional TOML file, then environment overrides.
//!
//! The resulting [`AgentConfig`] is built once per run and passed by reference
//! to every stage. Nothing re-reads the environment mid-run.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::budget::BudgetLimits;
use crate::io::retry::RetryPolicy;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "researcher.toml";

/// Research loop configuration (TOML).
///
/// Missing fields default to the values documented on each section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Gate the Research stage and the citation rules of the quality gate.
    pub research_enabled: bool,

    /// Decide stops once `iteration` reaches this value.
    pub max_iterations: u32,

    /// Decide stops early once the quality gate scores at least this much.
    pub min_score: u8,

    /// Require `[S#]` markers when research is enabled.
    pub require_citations: bool,

    /// Ceiling on total stage executions, independent of Decide.
    pub step_limit: u32,

    /// Keep the first non-empty source list for the whole run.
    pub freeze_sources: bool,

    pub budget: BudgetLimits,
    pub search: SearchConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub model: ModelConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            research_enabled: true,
            max_iterations: 3,
            min_score: 8,
            require_citations: true,
            step_limit: 50,
            freeze_sources: false,
            budget: BudgetLimits::default(),
            search: SearchConfig::default(),
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    Strict,
    Moderate,
    Off,
}

impl FromStr for SafeSearch {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "on" => Ok(SafeSearch::Strict),
            "moderate" => Ok(SafeSearch::Moderate),
            "off" => Ok(SafeSearch::Off),
            other => Err(anyhow!("unknown safesearch level {other:?}")),
        }
    }
}

/// Recency filter for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for TimeWindow {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "day" => Ok(TimeWindow::Day),
            "w" | "week" => Ok(TimeWindow::Week),
            "m" | "month" => Ok(TimeWindow::Month),
            "y" | "year" => Ok(TimeWindow::Year),
            other => Err(anyhow!("unknown time window {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchConfig {
    pub region: String,
    pub safesearch: SafeSearch,
    pub time_window: Option<TimeWindow>,
    pub max_results: u32,
    /// Pages fetched per Research pass (still subject to the fetch ceiling).
    pub pages_per_pass: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            region: "wt-wt".to_string(),
            safesearch: SafeSearch::Moderate,
            time_window: None,
            max_results: 5,
            pages_per_pass: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for search requests and page fetches.
    pub timeout_secs: u64,
    /// Extracted page text is truncated to this many characters.
    pub max_chars_per_page: usize,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_chars_per_page: 6_000,
            user_agent: concat!("researcher/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry policy shared by the model, search and fetch collaborators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub pause_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            pause_ms: 1_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.pause_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "llama3.1".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.2,
            timeout_secs: 300,
        }
    }
}

/// Stage executions for a run that uses every iteration: Plan once, then five per pass.
pub fn stage_executions_needed(max_iterations: u32) -> u32 {
    max_iterations.saturating_mul(5).saturating_add(1)
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.min_score > 10 {
            return Err(anyhow!("min_score must be within 0..=10"));
        }
        if self.step_limit == 0 {
            return Err(anyhow!("step_limit must be > 0"));
        }
        let needed = stage_executions_needed(self.max_iterations);
        if self.step_limit < needed {
            return Err(anyhow!(
                "step_limit ({}) must be at least {needed} to allow max_iterations ({}) full passes",
                self.step_limit,
                self.max_iterations
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be > 0"));
        }
        if self.http.timeout_secs == 0 {
            return Err(anyhow!("http.timeout_secs must be > 0"));
        }
        if self.http.max_chars_per_page == 0 {
            return Err(anyhow!("http.max_chars_per_page must be > 0"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeout_secs must be > 0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(anyhow!("model.name must be non-empty"));
        }
        if self.model.base_url.trim().is_empty() {
            return Err(anyhow!("model.base_url must be non-empty"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within 0.0..=2.0"));
        }
        Ok(())
    }

    /// Apply environment-style overrides. `lookup` returns the raw value for a key.
    ///
    /// Flags accept `1`/`0` (also `true`/`false`); unparseable values are errors
    /// naming the offending key.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };
        env.flag("RESEARCH_ENABLED", &mut self.research_enabled)?;
        env.parse("MAX_ITERS", &mut self.max_iterations)?;
        env.parse("EARLY_STOP_MIN_SCORE", &mut self.min_score)?;
        env.flag(
            "REQUIRE_CITATIONS_WHEN_RESEARCH_ENABLED",
            &mut self.require_citations,
        )?;
        env.parse("RECURSION_LIMIT", &mut self.step_limit)?;
        env.flag("FREEZE_SOURCES", &mut self.freeze_sources)?;

        env.parse("BUDGET_MAX_SEARCH_CALLS", &mut self.budget.max_search_calls)?;
        env.parse("BUDGET_MAX_PAGES_FETCHED", &mut self.budget.max_pages_fetched)?;
        env.parse("BUDGET_MAX_TOKEN_ESTIMATE", &mut self.budget.max_token_estimate)?;

        env.string("DDG_REGION", &mut self.search.region);
        env.parse("DDG_SAFESEARCH", &mut self.search.safesearch)?;
        if let Some(raw) = env.raw("DDG_TIMELIMIT") {
            self.search.time_window = if raw.trim().is_empty() {
                None
            } else {
                Some(raw.parse().context("parse DDG_TIMELIMIT")?)
            };
        }
        env.parse("SEARCH_MAX_RESULTS", &mut self.search.max_results)?;
        env.parse("PAGES_PER_PASS", &mut self.search.pages_per_pass)?;

        env.parse("HTTP_TIMEOUT", &mut self.http.timeout_secs)?;
        env.parse("MAX_CHARS_PER_PAGE", &mut self.http.max_chars_per_page)?;

        env.parse("RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts)?;
        env.parse("RETRY_PAUSE_MS", &mut self.retry.pause_ms)?;

        env.string("OLLAMA_MODEL", &mut self.model.name);
        env.string("OLLAMA_BASE_URL", &mut self.model.base_url);
        env.parse("OLLAMA_TEMPERATURE", &mut self.model.temperature)?;
        env.parse("MODEL_TIMEOUT", &mut self.model.timeout_secs)?;
        Ok(())
    }
}

struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn string(&self, key: &str, slot: &mut String) {
        if let Some(value) = self.raw(key) {
            debug!(key, "config override from environment");
            *slot = value.trim().to_string();
        }
    }

    fn parse<T>(&self, key: &str, slot: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some(value) = self.raw(key) {
            debug!(key, "config override from environment");
            *slot = value
                .trim()
                .parse()
                .map_err(|err| anyhow!("parse {key}={value:?}: {err}"))?;
        }
        Ok(())
    }

    fn flag(&self, key: &str, slot: &mut bool) -> Result<()> {
        if let Some(value) = self.raw(key) {
            *slot = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => return Err(anyhow!("parse {key}={other:?}: expected 1 or 0")),
            };
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        return Ok(AgentConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Build the run configuration: file (if any), then process environment, then validation.
pub fn resolve_config(path: Option<&Path>) -> Result<AgentConfig> {
    let mut cfg = match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
            load_config(path)?
        }
        None => load_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AgentConfig::default();
        cfg.validate().expect("valid");
        assert_eq!(cfg.max_iterations, 3);
        assert_eq!(cfg.min_score, 8);
        assert_eq!(cfg.budget.max_search_calls, 6);
        assert_eq!(cfg.budget.max_pages_fetched, 6);
        assert_eq!(cfg.budget.max_token_estimate, 24_000);
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.retry.pause_ms, 1_000);
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("researcher.toml");
        fs::write(
            &path,
            "max_iterations = 5\n\n[budget]\nmax_search_calls = 2\n\n[search]\nsafesearch = \"strict\"\ntime_window = \"week\"\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.budget.max_search_calls, 2);
        assert_eq!(cfg.budget.max_pages_fetched, 6);
        assert_eq!(cfg.search.safesearch, SafeSearch::Strict);
        assert_eq!(cfg.search.time_window, Some(TimeWindow::Week));
        assert_eq!(cfg.model, ModelConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let vars = env(&[
            ("RESEARCH_ENABLED", "0"),
            ("MAX_ITERS", "4"),
            ("BUDGET_MAX_TOKEN_ESTIMATE", "100"),
            ("DDG_TIMELIMIT", "m"),
            ("OLLAMA_MODEL", " qwen2.5 "),
            ("OLLAMA_TEMPERATURE", "0.7"),
        ]);
        let mut cfg = AgentConfig::default();
        cfg.apply_env(|key| vars.get(key).cloned()).expect("apply");

        assert!(!cfg.research_enabled);
        assert_eq!(cfg.max_iterations, 4);
        assert_eq!(cfg.budget.max_token_estimate, 100);
        assert_eq!(cfg.search.time_window, Some(TimeWindow::Month));
        assert_eq!(cfg.model.name, "qwen2.5");
        assert!((cfg.model.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn unparseable_env_value_names_the_key() {
        let vars = env(&[("MAX_ITERS", "lots")]);
        let mut cfg = AgentConfig::default();
        let err = cfg
            .apply_env(|key| vars.get(key).cloned())
            .expect_err("should fail");
        assert!(err.to_string().contains("MAX_ITERS"));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let cfg = AgentConfig {
            max_iterations: 0,
            ..AgentConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AgentConfig {
            min_score: 11,
            ..AgentConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AgentConfig {
            step_limit: 0,
            ..AgentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn step_limit_must_cover_every_iteration() {
        assert_eq!(stage_executions_needed(3), 16);
        assert_eq!(stage_executions_needed(u32::MAX), u32::MAX);

        let cfg = AgentConfig {
            max_iterations: 10,
            ..AgentConfig::default()
        };
        let err = cfg.validate().expect_err("50 steps cannot fit 10 iterations");
        let message = err.to_string();
        assert!(message.contains("step_limit (50)"), "{message}");
        assert!(message.contains("at least 51"), "{message}");
        assert!(message.contains("max_iterations (10)"), "{message}");

        let cfg = AgentConfig {
            max_iterations: 10,
            step_limit: 51,
            ..AgentConfig::default()
        };
        cfg.validate().expect("exact fit is valid");

        let cfg = AgentConfig {
            max_iterations: 9,
            ..AgentConfig::default()
        };
        cfg.validate().expect("default step limit fits 9 iterations");
    }

    #[test]
    fn zero_budget_ceilings_are_allowed() {
        let cfg = AgentConfig {
            budget: BudgetLimits {
                max_search_calls: 0,
                max_pages_fetched: 0,
                max_token_estimate: 0,
            },
            ..AgentConfig::default()
        };
        cfg.validate().expect("valid");
    }
}
