//! Critique: a narrative review from the model plus the rule-based quality gate.
//!
//! Only the gate's verdict sets `quality_score`; the narrative is advisory
//! input for Revise.

use anyhow::Result;
use tracing::{debug, info, instrument};

use super::{SKIPPED_CRITIQUE, Stage, StageContext};
use crate::core::citations::dangling_citations;
use crate::core::quality::GateVerdict;
use crate::core::types::RunState;

#[instrument(skip_all, fields(iteration = state.iteration))]
pub fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<()> {
    let prompt = ctx
        .prompts
        .render_critique(&state.question, &state.draft, state.research_enabled)?;
    ctx.guard
        .charge_tokens(&mut state.budget, &prompt, "critique prompt");
    if ctx.is_stopped(state) {
        debug!("budget stopped; skipping critique");
        state.critique = SKIPPED_CRITIQUE.to_string();
        state.quality_score = 0;
        return Ok(());
    }

    let narrative = ctx.generate(Stage::Critique, &prompt)?;
    ctx.guard
        .charge_tokens(&mut state.budget, &narrative, "critique output");

    let verdict = ctx.gate.check(state.research_enabled, &state.draft);
    info!(score = verdict.score, "quality gate");
    let dangling = if state.research_enabled {
        dangling_citations(&state.draft, &state.sources)
    } else {
        Vec::new()
    };
    state.quality_score = verdict.score;
    state.critique = compose_critique(&narrative, &verdict, &dangling);
    Ok(())
}

fn compose_critique(narrative: &str, verdict: &GateVerdict, dangling: &[String]) -> String {
    let mut critique = format!(
        "{}\n\nQuality gate ({}/10):\n{}",
        narrative.trim(),
        verdict.score,
        verdict.feedback
    );
    if !dangling.is_empty() {
        let markers: Vec<String> = dangling.iter().map(|id| format!("[{id}]")).collect();
        critique.push_str(&format!(
            "\n\nCitations without a current source: {}. Replace or remove them.",
            markers.join(", ")
        ));
    }
    critique
}
