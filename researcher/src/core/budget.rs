//! Budget guard: three independent resource ceilings for a single run.
//!
//! Charges are applied *after* the unit of work they represent, so the guard is
//! a circuit breaker for the next unit of work rather than a pre-admission
//! check. A single in-flight operation may push a counter past its ceiling.
//! Callers must consult [`BudgetGuard::is_stopped`] before starting anything
//! expensive. The guard never fails; it only flips the sticky `stopped` flag.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::types::{BudgetState, StopReason, StopTrigger};

/// Characters per token for the rough estimate. Not a real tokenizer.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Resource ceilings enforced by [`BudgetGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetLimits {
    pub max_search_calls: u32,
    pub max_pages_fetched: u32,
    pub max_token_estimate: u64,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_search_calls: 6,
            max_pages_fetched: 6,
            max_token_estimate: 24_000,
        }
    }
}

/// Estimated token cost of `text`: 0 for empty text, otherwise at least 1.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as u64;
    chars.div_ceil(CHARS_PER_TOKEN).max(1)
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetGuard {
    limits: BudgetLimits,
}

impl BudgetGuard {
    pub fn new(limits: BudgetLimits) -> Self {
        Self { limits }
    }

    /// Add the estimated cost of `text`; stop if the running total exceeds the ceiling.
    pub fn charge_tokens(&self, budget: &mut BudgetState, text: &str, reason: &str) {
        let cost = estimate_tokens(text);
        budget.token_estimate = budget.token_estimate.saturating_add(cost);
        debug!(
            reason,
            cost,
            total = budget.token_estimate,
            "charged tokens"
        );
        if budget.token_estimate > self.limits.max_token_estimate {
            self.stop(
                budget,
                StopTrigger::TokenEstimate,
                format!(
                    "token estimate {} exceeded {} after {reason} (+{cost})",
                    budget.token_estimate, self.limits.max_token_estimate
                ),
            );
        }
    }

    /// Count one search call; stop if the count exceeds the ceiling.
    pub fn charge_search(&self, budget: &mut BudgetState) {
        budget.search_calls = budget.search_calls.saturating_add(1);
        if budget.search_calls > self.limits.max_search_calls {
            self.stop(
                budget,
                StopTrigger::SearchCalls,
                format!(
                    "search calls {} exceeded limit {}",
                    budget.search_calls, self.limits.max_search_calls
                ),
            );
        }
    }

    /// Count one page fetch; stop if the count exceeds the ceiling.
    pub fn charge_fetch(&self, budget: &mut BudgetState) {
        budget.pages_fetched = budget.pages_fetched.saturating_add(1);
        if budget.pages_fetched > self.limits.max_pages_fetched {
            self.stop(
                budget,
                StopTrigger::PagesFetched,
                format!(
                    "pages fetched {} exceeded limit {}",
                    budget.pages_fetched, self.limits.max_pages_fetched
                ),
            );
        }
    }

    /// Set the sticky flag and record why. Every call appends, even when already stopped.
    pub fn stop(&self, budget: &mut BudgetState, trigger: StopTrigger, detail: impl Into<String>) {
        let reason = StopReason {
            trigger,
            detail: detail.into(),
        };
        warn!(trigger = trigger.as_str(), detail = %reason.detail, "budget stopped");
        budget.stopped = true;
        budget.reasons.push(reason);
    }

    pub fn is_stopped(&self, budget: &BudgetState) -> bool {
        budget.stopped
    }
}
