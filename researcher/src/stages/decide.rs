//! Decide: count the finished pass and choose whether to loop again.

use tracing::{info, instrument};

use super::StageContext;
use crate::core::types::{Decision, RunState, StopCause};

/// Count the finished iteration and choose whether to loop again.
///
/// Checks run in priority order: a stopped budget, an acceptable quality score,
/// then the iteration ceiling.
#[instrument(skip_all)]
pub fn run(ctx: &StageContext<'_>, state: &mut RunState) {
    state.iteration += 1;
    let cause = if ctx.is_stopped(state) {
        Some(StopCause::BudgetStopped)
    } else if state.quality_score >= ctx.config.min_score {
        Some(StopCause::QualityMet)
    } else if state.iteration >= ctx.config.max_iterations {
        Some(StopCause::IterationCeiling)
    } else {
        None
    };

    state.decision = if cause.is_some() {
        Decision::Stop
    } else {
        Decision::Continue
    };
    state.stop_cause = cause;
    info!(
        iteration = state.iteration,
        score = state.quality_score,
        decision = ?state.decision,
        cause = cause.map(|c| c.as_str()),
        "decided"
    );
}
