//! Entry points for one research run.

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{info, instrument};

use crate::controller::run_loop;
use crate::core::types::RunState;
use crate::io::config::AgentConfig;
use crate::stages::{Services, Stage, StageContext};

/// Answer `question` with a fresh run state.
///
/// Returns the final state; front ends show [`RunState::answer`] and list
/// `sources`. Errors only on an empty question, a model failure after retries,
/// or an exceeded step limit.
pub fn run(question: &str, config: &AgentConfig, services: Services<'_>) -> Result<RunState> {
    run_with(question, config, services, None, |_, _| {})
}

/// [`run`] with a cancellation flag and a per-stage observer.
#[instrument(skip_all, fields(research_enabled = config.research_enabled))]
pub fn run_with<F: FnMut(Stage, &RunState)>(
    question: &str,
    config: &AgentConfig,
    services: Services<'_>,
    cancel: Option<&AtomicBool>,
    on_stage: F,
) -> Result<RunState> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let started = Instant::now();
    let ctx = StageContext::new(config, services);
    let mut state = RunState::new(question, config.research_enabled);
    let outcome = run_loop(&ctx, &mut state, cancel, on_stage)?;
    info!(
        steps = outcome.steps_executed,
        iterations = state.iteration,
        score = state.quality_score,
        stopped = state.budget.stopped,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "run complete"
    );
    Ok(state)
}
