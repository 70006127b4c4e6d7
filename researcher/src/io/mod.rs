//! Side-effecting adapters: configuration, collaborators, prompts, reports.

pub mod config;
pub mod fetch;
pub mod html;
pub mod model;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod search;
