//! Draft: write (or rewrite) the answer from the notes and sources.

use anyhow::Result;
use tracing::{debug, instrument};

use super::{FALLBACK_DRAFT, RESEARCH_UNAVAILABLE, Stage, StageContext};
use crate::core::types::RunState;
use crate::io::prompt::DraftInputs;

#[instrument(skip_all, fields(iteration = state.iteration))]
pub fn run(ctx: &StageContext<'_>, state: &mut RunState) -> Result<()> {
    let context = draft_context(ctx, state);
    let prompt = ctx.prompts.render_draft(&DraftInputs {
        question: &state.question,
        plan: &state.plan,
        context: &context,
        research_enabled: state.research_enabled,
        sources: &state.sources,
        previous_draft: &state.draft,
    })?;
    ctx.guard
        .charge_tokens(&mut state.budget, &prompt, "draft prompt");
    if ctx.is_stopped(state) {
        debug!("budget stopped; using fallback draft");
        state.draft = FALLBACK_DRAFT.to_string();
        return Ok(());
    }

    let draft = ctx.generate(Stage::Draft, &prompt)?;
    ctx.guard
        .charge_tokens(&mut state.budget, &draft, "draft output");
    state.draft = draft;
    Ok(())
}

/// Notes plus the source list when research produced both; otherwise the
/// cautious stand-in.
fn draft_context(ctx: &StageContext<'_>, state: &RunState) -> String {
    let ready = state.research_enabled
        && !state.sources.is_empty()
        && !state.notes.trim().is_empty()
        && !ctx.is_stopped(state);
    if !ready {
        return RESEARCH_UNAVAILABLE.to_string();
    }

    let mut context = format!("Notes:\n{}\n\nSources:", state.notes.trim());
    for source in &state.sources {
        context.push_str(&format!(
            "\n{} {} ({})",
            source.marker(),
            source.title,
            source.url
        ));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Source;
    use crate::stages::Services;
    use crate::test_support::{ScriptedFetcher, ScriptedModel, ScriptedSearch, test_config};

    fn source(k: usize) -> Source {
        Source {
            id: format!("S{k}"),
            url: format!("https://example.com/{k}"),
            title: format!("Result {k}"),
            snippet: String::new(),
        }
    }

    #[test]
    fn uses_notes_and_sources_when_research_is_ready() {
        let cfg = test_config();
        let model = ScriptedModel::new(vec!["answer [S1]"]);
        let search = ScriptedSearch::new(Vec::new());
        let fetcher = ScriptedFetcher::new();
        let ctx = StageContext::new(
            &cfg,
            Services {
                model: &model,
                search: &search,
                fetcher: &fetcher,
            },
        );
        let mut state = RunState::new("q", true);
        state.notes = "found things [S1]".to_string();
        state.sources = vec![source(1), source(2)];

        run(&ctx, &mut state).expect("draft");

        assert_eq!(state.draft, "answer [S1]");
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("found things [S1]"));
        assert!(prompt.contains("[S2] Result 2 (https://example.com/2)"));
        assert!(!prompt.contains(RESEARCH_UNAVAILABLE));
    }

    #[test]
    fn falls_back_to_unavailable_context_without_sources() {
        let cfg = test_config();
        let model = ScriptedModel::new(vec!["cautious answer"]);
        let search = ScriptedSearch::new(Vec::new());
        let fetcher = ScriptedFetcher::new();
        let ctx = StageContext::new(
            &cfg,
            Services {
                model: &model,
                search: &search,
                fetcher: &fetcher,
            },
        );
        let mut state = RunState::new("q", true);
        state.notes = "notes".to_string();

        run(&ctx, &mut state).expect("draft");

        assert!(model.prompts()[0].contains(RESEARCH_UNAVAILABLE));
    }

    #[test]
    fn carries_previous_draft_into_prompt() {
        let cfg = test_config();
        let model = ScriptedModel::new(vec!["second draft"]);
        let search = ScriptedSearch::new(Vec::new());
        let fetcher = ScriptedFetcher::new();
        let ctx = StageContext::new(
            &cfg,
            Services {
                model: &model,
                search: &search,
                fetcher: &fetcher,
            },
        );
        let mut state = RunState::new("q", false);
        state.draft = "revised first draft".to_string();

        run(&ctx, &mut state).expect("draft");

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("<previous_draft>"));
        assert!(prompt.contains("revised first draft"));
        assert_eq!(state.draft, "second draft");
    }

    #[test]
    fn stopped_budget_yields_fallback_draft() {
        let mut cfg = test_config();
        cfg.budget.max_token_estimate = 0;
        let model = ScriptedModel::new(Vec::new());
        let search = ScriptedSearch::new(Vec::new());
        let fetcher = ScriptedFetcher::new();
        let ctx = StageContext::new(
            &cfg,
            Services {
                model: &model,
                search: &search,
                fetcher: &fetcher,
            },
        );
        let mut state = RunState::new("q", false);

        run(&ctx, &mut state).expect("draft");

        assert_eq!(state.draft, FALLBACK_DRAFT);
        assert!(state.draft.contains("verify"));
        assert_eq!(model.calls(), 0);
    }
}
