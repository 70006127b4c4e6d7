//! Plan: one model call that outlines how to answer the question.

use anyhow::Result;
use tracing::{debug, instrument};

use super::{FALLBACK_PLAN, Stage, StageContext};
use crate::core::types::RunState;

#[instrument(skip_all)]
pub fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<()> {
    let prompt = ctx
        .prompts
        .render_plan(&state.question, state.research_enabled)?;
    ctx.guard
        .charge_tokens(&mut state.budget, &prompt, "plan prompt");
    if ctx.is_stopped(state) {
        debug!("budget stopped; using fallback plan");
        state.plan = FALLBACK_PLAN.to_string();
        return Ok(());
    }

    let plan = ctx.generate(Stage::Plan, &prompt)?;
    ctx.guard.charge_tokens(&mut state.budget, &plan, "plan output");
    state.plan = plan;
    Ok(())
}
