//! Retry policy for decision calls.
//!
//! The options mirror what an HTTP model client accepts (attempts, backoff
//! base, initial delay, retryable status codes). They are passed through to
//! whoever makes the call; [`with_retry`] is the loop the delegating worker
//! wraps around its decider.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

fn default_attempts() -> u32 {
    5
}

fn default_exp_base() -> u32 {
    7
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_http_status_codes() -> Vec<u16> {
    vec![429, 500, 503, 504]
}

/// Retry options for decision calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Delay multiplier between attempts.
    #[serde(default = "default_exp_base")]
    pub exp_base: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Status codes that make a failure retryable.
    #[serde(default = "default_http_status_codes")]
    pub http_status_codes: Vec<u16>,
    /// Jitter applied to each delay.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            exp_base: default_exp_base(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            http_status_codes: default_http_status_codes(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that never retry.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_attempts(1)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the backoff base.
    #[must_use]
    pub fn with_exp_base(mut self, exp_base: u32) -> Self {
        self.exp_base = exp_base;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay_ms(mut self, delay: u64) -> Self {
        self.initial_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the retryable status codes.
    #[must_use]
    pub fn with_http_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.http_status_codes = codes;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Computes the delay before retry number `retry` (0-indexed):
    /// `initial_delay * exp_base^retry`, capped at `max_delay_ms`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = self
            .initial_delay_ms
            .saturating_mul(u64::from(self.exp_base).saturating_pow(retry))
            .min(self.max_delay_ms);

        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Executes an operation, retrying retryable failures with backoff.
///
/// Gives up when `is_retryable` rejects the error or the attempts are spent,
/// returning the last error.
pub async fn with_retry<T, E, F, Fut, R>(
    options: &RetryOptions,
    key: &str,
    is_retryable: R,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let attempts = options.attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts || !is_retryable(&e) {
                    return Err(e);
                }
                let delay = options.delay_for(attempt - 1);
                warn!(
                    key = %key,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying after error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_options() {
        let options = RetryOptions::default();
        assert_eq!(options.attempts, 5);
        assert_eq!(options.exp_base, 7);
        assert_eq!(options.initial_delay_ms, 1000);
        assert_eq!(options.http_status_codes, vec![429, 500, 503, 504]);
    }

    #[test]
    fn test_deserialize_partial_options() {
        let options: RetryOptions = serde_json::from_str(r#"{"attempts": 2}"#).unwrap();
        assert_eq!(options.attempts, 2);
        assert_eq!(options.exp_base, 7);
        assert_eq!(options.jitter, JitterStrategy::None);
    }

    #[test]
    fn test_delay_exponential_and_capped() {
        let options = RetryOptions::new()
            .with_initial_delay_ms(100)
            .with_exp_base(7)
            .with_max_delay_ms(10_000);

        assert_eq!(options.delay_for(0), Duration::from_millis(100));
        assert_eq!(options.delay_for(1), Duration::from_millis(700));
        assert_eq!(options.delay_for(2), Duration::from_millis(4900));
        assert_eq!(options.delay_for(3), Duration::from_millis(10_000));
    }

    #[test]
    fn test_full_jitter_within_bounds() {
        let options = RetryOptions::new()
            .with_initial_delay_ms(100)
            .with_jitter(JitterStrategy::Full);

        for _ in 0..20 {
            assert!(options.delay_for(0) <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_with_retry_recovers() {
        let options = RetryOptions::new().with_attempts(3).with_initial_delay_ms(1);
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = with_retry(&options, "op", |_| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts() {
        let options = RetryOptions::new().with_attempts(2).with_initial_delay_ms(1);
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retry(&options, "op", |_| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_skips_non_retryable() {
        let options = RetryOptions::new().with_initial_delay_ms(1);
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retry(&options, "op", |_| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("bad request".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
