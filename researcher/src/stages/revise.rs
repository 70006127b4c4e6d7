//! Revise: apply the critique. The revision becomes the next pass's draft.

use anyhow::Result;
use tracing::{debug, instrument};

use super::{Stage, StageContext};
use crate::core::types::RunState;
use crate::io::prompt::ReviseInputs;

#[instrument(skip_all, fields(iteration = state.iteration))]
pub fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<()> {
    let prompt = ctx.prompts.render_revise(&ReviseInputs {
        question: &state.question,
        draft: &state.draft,
        critique: &state.critique,
        research_enabled: state.research_enabled,
        sources: &state.sources,
    })?;
    ctx.guard
        .charge_tokens(&mut state.budget, &prompt, "revise prompt");
    if ctx.is_stopped(state) {
        debug!("budget stopped; keeping draft as revision");
        state.revision = state.draft.clone();
        return Ok(());
    }

    let revision = ctx.generate(Stage::Revise, &prompt)?;
    ctx.guard
        .charge_tokens(&mut state.budget, &revision, "revise output");
    state.draft = revision.clone();
    state.revision = revision;
    Ok(())
}
