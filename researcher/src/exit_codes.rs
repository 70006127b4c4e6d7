//! Stable exit codes for the researcher CLI.

/// The run finished and an answer was printed.
pub const OK: i32 = 0;
/// Invalid input or configuration; nothing was run.
pub const INVALID: i32 = 1;
/// The run aborted (model unavailable after retries, report not written, etc.).
pub const FAILED: i32 = 2;
/// The run exceeded the configured step limit.
pub const STEP_LIMIT: i32 = 3;
