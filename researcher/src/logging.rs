//! Diagnostic tracing for the researcher.
//!
//! Tracing goes to stderr and never mixes with the answer printed on stdout.
//! `RUST_LOG` wins when set; otherwise `--verbose` selects `researcher=info`
//! and the default is `warn`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=researcher=debug researcher "What is a B-tree?"
/// ```
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose { "warn,researcher=info" } else { "warn" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_crate_level_only() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "warn,researcher=info");
    }
}
