//! Self-reflective research loop over a local language model.
//!
//! A run answers one question by planning once and then cycling
//! research, draft, critique, revise and decide until a rule-based quality gate
//! is satisfied, an iteration ceiling is reached, or a resource budget is
//! exhausted. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (run state, budget accounting,
//!   citation checks, quality scoring). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (configuration, HTTP search and fetch,
//!   the model client, prompt rendering, run reports). Collaborators sit behind
//!   traits to enable scripted fakes in tests.
//!
//! Orchestration modules ([`stages`], [`controller`], [`agent`]) coordinate
//! core logic with I/O to implement a run.

pub mod agent;
pub mod controller;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod render;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{run, run_with};
pub use controller::StepLimitExceededError;
pub use stages::Services;
