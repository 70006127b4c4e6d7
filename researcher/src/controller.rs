//! Loop controller: walks the stage graph until Decide says stop.
//!
//! `Plan` runs once; afterwards the controller cycles
//! `Research → Draft → Critique → Revise → Decide` and follows Decide's
//! back-edge to `Research` (never back to `Plan`). Every stage execution counts
//! against `step_limit`, independently of Decide.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, info_span, warn};

use crate::core::types::{Decision, RunState, StopTrigger};
use crate::stages::{Stage, StageContext};

/// The run needed more stage executions than `step_limit` allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLimitExceededError {
    pub limit: u32,
    /// The stage that would have run next.
    pub stage: Stage,
}

impl fmt::Display for StepLimitExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step limit of {} reached before the {} stage; raise the limit or lower max iterations",
            self.limit, self.stage
        )
    }
}

impl std::error::Error for StepLimitExceededError {}

/// Summary of a finished loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub steps_executed: u32,
}

/// The stage that follows `stage`, or `None` when the run is over.
pub fn next_stage(stage: Stage, decision: Decision) -> Option<Stage> {
    match stage {
        Stage::Plan => Some(Stage::Research),
        Stage::Research => Some(Stage::Draft),
        Stage::Draft => Some(Stage::Critique),
        Stage::Critique => Some(Stage::Revise),
        Stage::Revise => Some(Stage::Decide),
        Stage::Decide => match decision {
            Decision::Continue => Some(Stage::Research),
            Decision::Stop => None,
        },
    }
}

/// Drive `state` from `Plan` to a stop decision.
///
/// `cancel` is polled before every stage; once raised, a `cancelled` stop
/// reason is recorded so the remaining stages degrade and Decide ends the run.
/// `on_stage` is called after every completed stage.
///
/// Stops immediately on a stage error (a model failure after retries) or when
/// the step ceiling is hit, which surfaces as [`StepLimitExceededError`].
pub fn run_loop<F: FnMut(Stage, &RunState)>(
    ctx: &StageContext<'_>,
    state: &mut RunState,
    cancel: Option<&AtomicBool>,
    mut on_stage: F,
) -> Result<LoopOutcome> {
    let limit = ctx.config.step_limit;
    let mut steps_executed = 0u32;
    let mut next = Some(Stage::Plan);

    while let Some(stage) = next {
        if steps_executed >= limit {
            return Err(StepLimitExceededError { limit, stage }.into());
        }
        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            record_cancellation(ctx, state);
        }

        let span = info_span!("stage", stage = stage.as_str(), iteration = state.iteration);
        let _entered = span.enter();
        stage.execute(ctx, state)?;
        steps_executed += 1;
        debug!(steps_executed, "stage complete");
        on_stage(stage, state);

        next = next_stage(stage, state.decision);
    }

    Ok(LoopOutcome { steps_executed })
}

fn record_cancellation(ctx: &StageContext<'_>, state: &mut RunState) {
    let already = state
        .budget
        .reasons
        .iter()
        .any(|reason| reason.trigger == StopTrigger::Cancelled);
    if already {
        return;
    }
    warn!("run cancelled by caller");
    ctx.guard
        .stop(&mut state.budget, StopTrigger::Cancelled, "run cancelled by caller");
}
