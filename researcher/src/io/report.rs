//! JSON run report written on request (`--report`).
//!
//! The report is an observability artifact; no later run reads it.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{BudgetState, RunState, Source, StopCause};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub question: String,
    pub answer: String,
    pub stop_cause: Option<StopCause>,
    pub iterations: u32,
    pub quality_score: u8,
    pub critique: String,
    pub budget: BudgetState,
    pub sources: Vec<Source>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn from_state(state: &RunState, duration_ms: u64) -> Self {
        Self {
            question: state.question.clone(),
            answer: state.answer().to_string(),
            stop_cause: state.stop_cause,
            iterations: state.iteration,
            quality_score: state.quality_score,
            critique: state.critique.clone(),
            budget: state.budget.clone(),
            sources: state.sources.clone(),
            duration_ms,
        }
    }
}

/// Atomically write the report as pretty JSON (temp file + rename).
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    debug!(path = %path.display(), "writing run report");
    let mut buf = serde_json::to_string_pretty(report).context("serialize run report")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace report {}", path.display()))?;
    Ok(())
}
