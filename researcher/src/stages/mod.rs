//! The six stages of the research loop.
//!
//! Each stage is a transformation of the shared [`RunState`]. Stages consult the
//! budget guard before every external call and degrade to a fixed cautious
//! fallback once it has stopped; only a language-model failure aborts a run.

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::budget::BudgetGuard;
use crate::core::quality::QualityGate;
use crate::core::types::RunState;
use crate::io::config::AgentConfig;
use crate::io::fetch::PageFetcher;
use crate::io::model::LanguageModel;
use crate::io::prompt::PromptEngine;
use crate::io::retry::RetryPolicy;
use crate::io::search::SearchProvider;

pub mod critique;
pub mod decide;
pub mod draft;
pub mod plan;
pub mod research;
pub mod revise;

/// Plan used when the budget stopped before planning.
pub const FALLBACK_PLAN: &str = "Budget exhausted before planning: proceed cautiously with verification.";

/// Notes used when the budget stopped before synthesis.
pub const FALLBACK_NOTES: &str = "Research budget exhausted before synthesis. Notes are unavailable; treat claims cautiously and verify them independently.";

/// Draft context when research is disabled, empty, or cut off by the budget.
pub const RESEARCH_UNAVAILABLE: &str = "Research unavailable. Be cautious: answer from general knowledge, state uncertainty plainly, and explain how the reader can verify the answer.";

/// Draft used when the budget stopped before drafting.
pub const FALLBACK_DRAFT: &str = "I could not complete this answer within the configured resource budget, so treat what follows as provisional.\n\nThe question could not be fully researched or drafted. Please verify any conclusion against authoritative primary sources before relying on it.";

/// Critique used when the budget stopped before critiquing.
pub const SKIPPED_CRITIQUE: &str = "Budget exhausted: skipping critique.";

/// Placeholder recorded for a page that could not be fetched.
pub const FAILED_FETCH: &str = "(failed to fetch)";

/// A node of the loop graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Plan,
    Research,
    Draft,
    Critique,
    Revise,
    Decide,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Research => "research",
            Stage::Draft => "draft",
            Stage::Critique => "critique",
            Stage::Revise => "revise",
            Stage::Decide => "decide",
        }
    }

    /// Run this stage against `state`.
    pub fn execute(self, ctx: &StageContext<'_>, state: &mut RunState) -> Result<()> {
        match self {
            Stage::Plan => plan::run(ctx, state),
            Stage::Research => research::run(ctx, state),
            Stage::Draft => draft::run(ctx, state),
            Stage::Critique => critique::run(ctx, state),
            Stage::Revise => revise::run(ctx, state),
            Stage::Decide => {
                decide::run(ctx, state);
                Ok(())
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three external collaborators a run depends on.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub model: &'a dyn LanguageModel,
    pub search: &'a dyn SearchProvider,
    pub fetcher: &'a dyn PageFetcher,
}

/// Everything a stage needs besides the run state. Built once per run.
pub struct StageContext<'a> {
    pub config: &'a AgentConfig,
    pub services: Services<'a>,
    pub guard: BudgetGuard,
    pub gate: QualityGate,
    pub prompts: PromptEngine,
    pub retry: RetryPolicy,
}

impl<'a> StageContext<'a> {
    pub fn new(config: &'a AgentConfig, services: Services<'a>) -> Self {
        Self {
            config,
            services,
            guard: BudgetGuard::new(config.budget),
            gate: QualityGate::new(config.require_citations),
            prompts: PromptEngine::new(),
            retry: config.retry.policy(),
        }
    }

    pub fn is_stopped(&self, state: &RunState) -> bool {
        self.guard.is_stopped(&state.budget)
    }

    /// Call the model under the shared retry policy. Exhausted retries are fatal.
    pub fn generate(&self, stage: Stage, prompt: &str) -> Result<String> {
        self.retry
            .run(stage.as_str(), || self.services.model.generate(prompt))
            .with_context(|| format!("{stage} stage: generate"))
    }
}
