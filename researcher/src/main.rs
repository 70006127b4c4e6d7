//! Self-reflective research loop CLI.
//!
//! Answers a question by planning, researching the web, drafting, critiquing
//! and revising until the answer passes a quality gate or the budget runs out.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use researcher::core::types::RunState;
use researcher::exit_codes;
use researcher::io::config::{AgentConfig, resolve_config};
use researcher::io::fetch::HttpFetcher;
use researcher::io::model::OllamaModel;
use researcher::io::report::{RunReport, write_report};
use researcher::io::search::DuckDuckGoSearch;
use researcher::render::{RenderStyle, render_answer};
use researcher::{Services, StepLimitExceededError, logging, run_with};

#[derive(Parser, Debug)]
#[command(
    name = "researcher",
    version,
    about = "Self-reflective research loop over a local language model"
)]
struct Cli {
    /// TOML config file (defaults to `researcher.toml` when present).
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable web research for this run.
    #[arg(long)]
    no_research: bool,
    /// Override the maximum number of research iterations.
    #[arg(long, value_name = "N")]
    max_iterations: Option<u32>,
    /// Print the final run state as JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Write a JSON run report to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Print a progress line per stage to stderr.
    #[arg(short, long)]
    verbose: bool,
    /// The question; read interactively from stdin when omitted.
    question: Vec<String>,
}

fn main() {
    // A missing .env is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.verbose);
    process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let config = match build_config(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return exit_codes::INVALID;
        }
    };
    let question = match read_question(&cli.question) {
        Ok(question) => question,
        Err(err) => {
            eprintln!("error: {err:#}");
            return exit_codes::INVALID;
        }
    };

    match answer(cli, &config, &question) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("error: {err:#}");
            failure_code(&err)
        }
    }
}

/// File and environment layers, then CLI overrides, then validation.
fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = resolve_config(cli.config.as_deref())?;
    if cli.no_research {
        config.research_enabled = false;
    }
    if let Some(max_iterations) = cli.max_iterations {
        config.max_iterations = max_iterations;
    }
    config.validate()?;
    Ok(config)
}

fn read_question(words: &[String]) -> Result<String> {
    let question = if words.is_empty() {
        print!("Question: ");
        io::stdout().flush().context("flush stdout")?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read question from stdin")?;
        line
    } else {
        words.join(" ")
    };
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }
    Ok(question.to_string())
}

fn answer(cli: &Cli, config: &AgentConfig, question: &str) -> Result<()> {
    let model = OllamaModel::new(&config.model)?;
    let search = DuckDuckGoSearch::new(&config.http)?;
    let fetcher = HttpFetcher::new(&config.http)?;
    let services = Services {
        model: &model,
        search: &search,
        fetcher: &fetcher,
    };

    let started = Instant::now();
    let verbose = cli.verbose;
    let state = run_with(question, config, services, None, |stage, state| {
        if verbose {
            eprintln!(
                "[{stage}] iteration={} score={} tokens={} searches={} pages={}",
                state.iteration,
                state.quality_score,
                state.budget.token_estimate,
                state.budget.search_calls,
                state.budget.pages_fetched
            );
        }
    })?;
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if cli.json {
        let json = serde_json::to_string_pretty(&state).context("serialize run state")?;
        println!("{json}");
    } else {
        print!("{}", format_output(&state));
    }

    if let Some(path) = &cli.report {
        write_report(path, &RunReport::from_state(&state, duration_ms))
            .with_context(|| format!("write report {}", path.display()))?;
    }
    Ok(())
}

fn format_output(state: &RunState) -> String {
    let mut out = String::from("\n----- Result -----\n");
    out.push_str(&render_answer(state, RenderStyle::Plain));
    out.push('\n');
    if state.budget.stopped {
        out.push_str("\n----- Budget -----\n");
        for reason in &state.budget.reasons {
            out.push_str(&format!("- {reason}\n"));
        }
    }
    out
}

fn failure_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<StepLimitExceededError>().is_some() {
        exit_codes::STEP_LIMIT
    } else {
        exit_codes::FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use researcher::core::types::{Source, StopReason, StopTrigger};
    use researcher::stages::Stage;

    #[test]
    fn parse_question_words() {
        let cli = Cli::parse_from(["researcher", "what", "is", "rust?"]);
        assert_eq!(cli.question, vec!["what", "is", "rust?"]);
        assert!(!cli.no_research);
        assert!(cli.config.is_none());
    }

    #[test]
    fn parse_all_options() {
        let cli = Cli::parse_from([
            "researcher",
            "-c",
            "custom.toml",
            "--no-research",
            "--max-iterations",
            "2",
            "--json",
            "--report",
            "out/report.json",
            "-v",
            "question",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(cli.no_research);
        assert_eq!(cli.max_iterations, Some(2));
        assert!(cli.json);
        assert_eq!(cli.report, Some(PathBuf::from("out/report.json")));
        assert!(cli.verbose);
    }

    #[test]
    fn question_words_are_joined() {
        let words = vec!["why".to_string(), "  now? ".to_string()];
        assert_eq!(read_question(&words).expect("question"), "why   now?");
    }

    #[test]
    fn output_lists_sources_and_budget_reasons() {
        let mut state = RunState::new("q", true);
        state.draft = "Answer [S1].".to_string();
        state.sources.push(Source {
            id: "S1".to_string(),
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            snippet: String::new(),
        });
        state.budget.stopped = true;
        state.budget.reasons.push(StopReason {
            trigger: StopTrigger::PagesFetched,
            detail: "pages fetched 7 exceeded limit 6".to_string(),
        });

        let out = format_output(&state);

        assert!(out.contains("----- Result -----\nAnswer [S1]."));
        assert!(out.contains("[S1] Example https://example.com"));
        assert!(out.contains("----- Budget -----\n- "));
        assert!(out.contains("pages fetched 7 exceeded limit 6"));
    }

    #[test]
    fn step_limit_maps_to_its_own_exit_code() {
        let err = anyhow::Error::new(StepLimitExceededError {
            limit: 5,
            stage: Stage::Draft,
        })
        .context("run");
        assert_eq!(failure_code(&err), exit_codes::STEP_LIMIT);
        assert_eq!(
            failure_code(&anyhow::anyhow!("model down")),
            exit_codes::FAILED
        );
    }
}
