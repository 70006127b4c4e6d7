//! Shared deterministic types for the research loop.
//!
//! `RunState` is the single record threaded through every stage. It is created
//! fresh per question, owned by the controller for the duration of a run and
//! discarded afterwards. These types carry no I/O and serialize to stable JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output of the Decide stage; drives the controller's back-edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Continue,
    Stop,
}

/// Which Decide branch ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// The budget guard was already stopped.
    BudgetStopped,
    /// The quality gate score reached `min_score`.
    QualityMet,
    /// `iteration` reached `max_iterations`.
    IterationCeiling,
}

impl StopCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopCause::BudgetStopped => "budget_stopped",
            StopCause::QualityMet => "quality_met",
            StopCause::IterationCeiling => "iteration_ceiling",
        }
    }
}

/// A search result promoted to a citable source.
///
/// `id` is `S<k>` where `k` is the 1-based position within one Research pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub title: String,
    pub snippet: String,
}

impl Source {
    /// The inline marker that cites this source, e.g. `[S2]`.
    pub fn marker(&self) -> String {
        format!("[{}]", self.id)
    }
}

/// What tripped the budget guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopTrigger {
    SearchCalls,
    PagesFetched,
    TokenEstimate,
    Cancelled,
}

impl StopTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopTrigger::SearchCalls => "search_calls",
            StopTrigger::PagesFetched => "pages_fetched",
            StopTrigger::TokenEstimate => "token_estimate",
            StopTrigger::Cancelled => "cancelled",
        }
    }
}

/// One entry in the append-only stop log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReason {
    pub trigger: StopTrigger,
    pub detail: String,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.trigger.as_str(), self.detail)
    }
}

/// Resource consumption for a single run.
///
/// Once `stopped` is set it never reverts, and `reasons` only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetState {
    pub search_calls: u32,
    pub pages_fetched: u32,
    pub token_estimate: u64,
    pub stopped: bool,
    pub reasons: Vec<StopReason>,
}

/// The mutable record threaded through every stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub question: String,
    pub plan: String,
    pub research_enabled: bool,
    pub sources: Vec<Source>,
    pub notes: String,
    pub draft: String,
    pub critique: String,
    pub revision: String,
    pub decision: Decision,
    pub iteration: u32,
    pub quality_score: u8,
    pub budget: BudgetState,
    pub stop_cause: Option<StopCause>,
}

impl RunState {
    /// Fresh state for a question: empty text fields, zero counters, `decision = continue`.
    pub fn new(question: impl Into<String>, research_enabled: bool) -> Self {
        Self {
            question: question.into(),
            plan: String::new(),
            research_enabled,
            sources: Vec::new(),
            notes: String::new(),
            draft: String::new(),
            critique: String::new(),
            revision: String::new(),
            decision: Decision::Continue,
            iteration: 0,
            quality_score: 0,
            budget: BudgetState::default(),
            stop_cause: None,
        }
    }

    /// The text a front end should show: `draft`, or `revision` when the draft is empty.
    pub fn answer(&self) -> &str {
        if self.draft.trim().is_empty() {
            &self.revision
        } else {
            &self.draft
        }
    }
}
