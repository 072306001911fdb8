//! Bounded retry with exponential backoff.
//!
//! Decisions opt in by wrapping the decider in [`crate::RetryingDecider`].
//! Snapshot saves on confirm are retried under `persistence` settings.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to retry and how long to wait in between.
///
/// The delay doubles after every failed attempt and is capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (1-based). Zero for `retry == 0`.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Sum of every wait the policy may impose.
    #[must_use]
    pub fn worst_case_wait(&self) -> Duration {
        (1..=self.max_retries).map(|r| self.backoff(r)).sum()
    }
}

/// Runs `attempt` until it succeeds, fails with an error `is_transient`
/// rejects, or the policy runs out of retries. The last error is returned.
pub async fn retry_async<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    is_transient: impl Fn(&E) -> bool,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Ok(value) => {
                if retry > 0 {
                    debug!(label, retry, "recovered after retry");
                }
                return Ok(value);
            }
            Err(e) if retry < policy.max_retries && is_transient(&e) => {
                retry += 1;
                let wait = policy.backoff(retry);
                warn!(label, retry, max_retries = policy.max_retries, ?wait, error = %e, "transient failure");
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}
