//! Prompt rendering for the model-calling stages.
//!
//! Templates live next to this module and are compiled into the binary.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::Source;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const RESEARCH_TEMPLATE: &str = include_str!("prompts/research.md");
const DRAFT_TEMPLATE: &str = include_str!("prompts/draft.md");
const CRITIQUE_TEMPLATE: &str = include_str!("prompts/critique.md");
const REVISE_TEMPLATE: &str = include_str!("prompts/revise.md");

/// Inputs for the research-notes prompt.
#[derive(Debug, Clone, Copy)]
pub struct NotesInputs<'a> {
    pub question: &'a str,
    pub plan: &'a str,
    pub sources: &'a [Source],
    /// One block per fetched (or failed) page.
    pub pages: &'a [String],
}

/// Inputs for the draft prompt.
#[derive(Debug, Clone, Copy)]
pub struct DraftInputs<'a> {
    pub question: &'a str,
    pub plan: &'a str,
    pub context: &'a str,
    pub research_enabled: bool,
    pub sources: &'a [Source],
    /// Revised text from the previous iteration, empty on the first pass.
    pub previous_draft: &'a str,
}

/// Inputs for the revise prompt.
#[derive(Debug, Clone, Copy)]
pub struct ReviseInputs<'a> {
    pub question: &'a str,
    pub draft: &'a str,
    pub critique: &'a str,
    pub research_enabled: bool,
    pub sources: &'a [Source],
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        env.add_template("research", RESEARCH_TEMPLATE)
            .expect("research template should be valid");
        env.add_template("draft", DRAFT_TEMPLATE)
            .expect("draft template should be valid");
        env.add_template("critique", CRITIQUE_TEMPLATE)
            .expect("critique template should be valid");
        env.add_template("revise", REVISE_TEMPLATE)
            .expect("revise template should be valid");
        Self { env }
    }

    pub fn render_plan(&self, question: &str, research_enabled: bool) -> Result<String> {
        let template = self.env.get_template("plan")?;
        let rendered = template.render(context! {
            question => question.trim(),
            research_enabled => research_enabled,
        })?;
        Ok(rendered)
    }

    pub fn render_notes(&self, input: &NotesInputs<'_>) -> Result<String> {
        let template = self.env.get_template("research")?;
        let rendered = template.render(context! {
            question => input.question.trim(),
            plan => input.plan.trim(),
            sources => input.sources,
            pages => input.pages,
            markers => marker_range(input.sources),
        })?;
        Ok(rendered)
    }

    pub fn render_draft(&self, input: &DraftInputs<'_>) -> Result<String> {
        let template = self.env.get_template("draft")?;
        let previous = input.previous_draft.trim();
        let rendered = template.render(context! {
            question => input.question.trim(),
            plan => input.plan.trim(),
            context => input.context.trim(),
            research_enabled => input.research_enabled,
            markers => marker_range(input.sources),
            previous_draft => (!previous.is_empty()).then_some(previous),
        })?;
        Ok(rendered)
    }

    pub fn render_critique(
        &self,
        question: &str,
        draft: &str,
        research_enabled: bool,
    ) -> Result<String> {
        let template = self.env.get_template("critique")?;
        let rendered = template.render(context! {
            question => question.trim(),
            draft => draft.trim(),
            research_enabled => research_enabled,
        })?;
        Ok(rendered)
    }

    pub fn render_revise(&self, input: &ReviseInputs<'_>) -> Result<String> {
        let template = self.env.get_template("revise")?;
        let rendered = template.render(context! {
            question => input.question.trim(),
            draft => input.draft.trim(),
            critique => input.critique.trim(),
            research_enabled => input.research_enabled,
            markers => marker_range(input.sources),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Allowed marker range for a source list, e.g. `[S1]...[S4]`.
pub fn marker_range(sources: &[Source]) -> String {
    match sources {
        [] => "none (there are no sources; do not cite)".to_string(),
        [only] => only.marker(),
        [first, .., last] => format!("{}...{}", first.marker(), last.marker()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(n: usize) -> Vec<Source> {
        (1..=n)
            .map(|k| Source {
                id: format!("S{k}"),
                url: format!("https://example.com/{k}"),
                title: format!("Title {k}"),
                snippet: format!("Snippet {k}"),
            })
            .collect()
    }

    #[test]
    fn marker_range_covers_all_shapes() {
        assert!(marker_range(&[]).starts_with("none"));
        assert_eq!(marker_range(&sources(1)), "[S1]");
        assert_eq!(marker_range(&sources(4)), "[S1]...[S4]");
    }

    #[test]
    fn plan_prompt_switches_on_research_flag() {
        let engine = PromptEngine::new();
        let online = engine.render_plan("What is Rust?", true).expect("render");
        let offline = engine.render_plan("What is Rust?", false).expect("render");
        assert!(online.contains("What is Rust?"));
        assert!(online.contains("web search"));
        assert!(offline.contains("verify"));
        assert!(!offline.contains("one web search"));
    }

    #[test]
    fn notes_prompt_lists_sources_then_pages() {
        let engine = PromptEngine::new();
        let sources = sources(2);
        let pages = vec![
            "[S1] Title 1\npage one text".to_string(),
            "[S2] Title 2\n(failed to fetch)".to_string(),
        ];
        let prompt = engine
            .render_notes(&NotesInputs {
                question: "q",
                plan: "the plan",
                sources: &sources,
                pages: &pages,
            })
            .expect("render");

        assert!(prompt.contains("[S1]...[S2]"));
        assert!(prompt.contains("the plan"));
        assert!(prompt.contains("Snippet 2"));
        let sources_pos = prompt.find("<sources>").expect("sources");
        let pages_pos = prompt.find("<pages>").expect("pages");
        assert!(sources_pos < pages_pos);
        assert!(prompt.contains("(failed to fetch)"));
    }

    #[test]
    fn draft_prompt_includes_previous_draft_only_when_present() {
        let engine = PromptEngine::new();
        let mut input = DraftInputs {
            question: "q",
            plan: "p",
            context: "ctx",
            research_enabled: false,
            sources: &[],
            previous_draft: "",
        };
        let first = engine.render_draft(&input).expect("render");
        assert!(!first.contains("<previous_draft>"));
        assert!(first.contains("How to verify"));

        input.previous_draft = "earlier answer";
        let second = engine.render_draft(&input).expect("render");
        assert!(second.contains("<previous_draft>"));
        assert!(second.contains("earlier answer"));
    }

    #[test]
    fn cited_draft_prompt_forbids_verification_section() {
        let engine = PromptEngine::new();
        let sources = sources(2);
        let mut input = DraftInputs {
            question: "q",
            plan: "p",
            context: "ctx",
            research_enabled: true,
            sources: &sources,
            previous_draft: "",
        };
        let cited = engine.render_draft(&input).expect("render");
        assert!(cited.contains(r#"Do NOT add a "How to verify" section."#));
        assert!(!cited.contains("Include a \"How to verify\" section"));

        input.research_enabled = false;
        input.sources = &[];
        let offline = engine.render_draft(&input).expect("render");
        assert!(offline.contains("Include a \"How to verify\" section"));
        assert!(!offline.contains("Do NOT add a \"How to verify\""));
    }

    #[test]
    fn revise_prompt_carries_draft_and_critique() {
        let engine = PromptEngine::new();
        let sources = sources(3);
        let prompt = engine
            .render_revise(&ReviseInputs {
                question: "q",
                draft: "the draft",
                critique: "the critique",
                research_enabled: true,
                sources: &sources,
            })
            .expect("render");
        assert!(prompt.contains("the draft"));
        assert!(prompt.contains("the critique"));
        assert!(prompt.contains("[S1]...[S3]"));
        assert!(prompt.contains("Remove any \"How to verify\" section"));
    }

    #[test]
    fn critique_prompt_includes_draft() {
        let engine = PromptEngine::new();
        let prompt = engine
            .render_critique("q", "draft body", true)
            .expect("render");
        assert!(prompt.contains("draft body"));
        assert!(prompt.contains("[S#]"));
    }
}
