//! Fixed-pause retry for blocking collaborator calls.
//!
//! One policy is shared by the language model, the search provider and the
//! page fetcher. What happens after the last failed attempt is the caller's
//! call: model failures are fatal, search and fetch failures degrade.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    pause: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; values below 1 are treated as 1.
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            pause,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn pause(&self) -> Duration {
        self.pause
    }

    /// Run `op` until it succeeds or attempts are exhausted; returns the last error.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    warn!(
                        what,
                        attempt,
                        max_attempts = self.max_attempts,
                        err = %format!("{err:#}"),
                        "attempt failed, retrying"
                    );
                    if !self.pause.is_zero() {
                        thread::sleep(self.pause);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}
