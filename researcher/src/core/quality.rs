//! Deterministic, rule-based quality gate for drafts.
//!
//! The gate is layered under the model's narrative critique so a run cannot
//! pass on self-assessment alone: citation discipline is checked per line.
//! Rules are evaluated in order and the first match wins.

use serde::{Deserialize, Serialize};

use crate::core::citations::{has_citation_markers, uncited_numeric_lines};

/// Maximum number of flagged lines echoed back in feedback.
pub const MAX_FLAGGED_LINES: usize = 6;

/// Score (0..=10) and feedback produced by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub score: u8,
    pub feedback: String,
}

impl GateVerdict {
    fn new(score: u8, feedback: impl Into<String>) -> Self {
        Self {
            score,
            feedback: feedback.into(),
        }
    }
}

/// Score `text`. Pure: identical inputs always yield identical verdicts.
pub fn score_draft(research_enabled: bool, require_citations: bool, text: &str) -> GateVerdict {
    if !research_enabled || !require_citations {
        if text.contains("verify") || text.contains("Verify") {
            return GateVerdict::new(
                8,
                "Good: includes verification guidance while research is unavailable.",
            );
        }
        return GateVerdict::new(
            5,
            "Research is disabled or not required: add uncertainty language and verification guidance (tell the reader how to verify).",
        );
    }

    if !has_citation_markers(text) {
        return GateVerdict::new(
            3,
            "Missing citation markers. Add inline markers like [S1], [S2] (pattern [S#]) wherever a sourced fact is claimed.",
        );
    }

    let flagged = uncited_numeric_lines(text);
    if !flagged.is_empty() {
        let sample = flagged
            .iter()
            .take(MAX_FLAGGED_LINES)
            .map(|line| format!("- {line}"))
            .collect::<Vec<_>>()
            .join("\n");
        return GateVerdict::new(
            6,
            format!("Some numeric or dated claims lack citations. Add [S#] on the same line:\n{sample}"),
        );
    }

    GateVerdict::new(
        9,
        "No major issues: citations present and numeric claims appear supported.",
    )
}

/// The gate bound to a run's citation policy.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    require_citations: bool,
}

impl QualityGate {
    pub fn new(require_citations: bool) -> Self {
        Self { require_citations }
    }

    pub fn check(&self, research_enabled: bool, text: &str) -> GateVerdict {
        score_draft(research_enabled, self.require_citations, text)
    }
}
