//! CLI tests for the `researcher` binary.
//!
//! Only paths that fail before any network call are exercised here; the loop
//! itself is covered against scripted collaborators in `research_loop.rs`.

use std::process::{Command, Stdio};

use researcher::exit_codes;
use researcher::test_support::TempConfig;

fn researcher(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_researcher"));
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("MAX_ITERS")
        .env_remove("RESEARCH_ENABLED")
        .stdin(Stdio::null());
    cmd
}

#[test]
fn missing_config_file_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = researcher(temp.path())
        .args(["--config", "nope.toml", "What is Rust?"])
        .output()
        .expect("run researcher");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "{stderr}");
}

#[test]
fn zero_max_iterations_override_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = researcher(temp.path())
        .args(["--max-iterations", "0", "What is Rust?"])
        .status()
        .expect("run researcher");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn max_iterations_beyond_step_limit_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = researcher(temp.path())
        .env_remove("RECURSION_LIMIT")
        .args(["--max-iterations", "10", "What is Rust?"])
        .output()
        .expect("run researcher");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("step_limit"), "{stderr}");
    assert!(stderr.contains("max_iterations"), "{stderr}");
}

#[test]
fn invalid_config_values_are_rejected() {
    let config = TempConfig::new("min_score = 11\n").expect("config");

    let output = researcher(config.dir())
        .arg("--config")
        .arg(config.path())
        .arg("What is Rust?")
        .output()
        .expect("run researcher");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("min_score"), "{stderr}");
}

#[test]
fn malformed_environment_value_names_the_key() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = researcher(temp.path())
        .env("BUDGET_MAX_SEARCH_CALLS", "lots")
        .arg("What is Rust?")
        .output()
        .expect("run researcher");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BUDGET_MAX_SEARCH_CALLS"), "{stderr}");
}

#[test]
fn empty_question_on_stdin_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = researcher(temp.path()).output().expect("run researcher");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Question: "));
}
