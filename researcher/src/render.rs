//! Answer rendering for front ends.

use crate::core::types::RunState;

/// Shown when a run produced no answer text.
pub const NO_OUTPUT: &str = "(No output)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
    /// Terminal output: `[S1] title url` lines under a separator.
    Plain,
    /// Chat front ends: a `### References` list of links.
    Markdown,
}

/// The final answer followed by a references block keyed by source id.
pub fn render_answer(state: &RunState, style: RenderStyle) -> String {
    let answer = state.answer().trim();
    let mut out = if answer.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        answer.to_string()
    };
    if state.sources.is_empty() {
        return out;
    }

    match style {
        RenderStyle::Plain => {
            out.push_str("\n\n----- Sources -----");
            for source in &state.sources {
                out.push_str(&format!("\n{} {} {}", source.marker(), source.title, source.url));
            }
        }
        RenderStyle::Markdown => {
            out.push_str("\n\n### References");
            for source in &state.sources {
                let title = if source.title.trim().is_empty() {
                    source.url.as_str()
                } else {
                    source.title.as_str()
                };
                out.push_str(&format!(
                    "\n- **{}** [{}]({})",
                    source.marker(),
                    title,
                    source.url
                ));
            }
        }
    }
    out
}
