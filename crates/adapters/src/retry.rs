use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::AdapterError;

#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first. 1 means no retry.
    pub max_retries: usize,
    pub sleep: Duration,
}

impl RetryConfig {
    pub const fn new(max_retries: usize, sleep: Duration) -> Self {
        Self { max_retries, sleep }
    }

    pub const fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            sleep: Duration::from_secs(2),
        }
    }
}

/// Runs `f` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent.
pub fn call_with_retry<F, T>(mut f: F, config: &RetryConfig) -> Result<T, AdapterError>
where
    F: FnMut() -> Result<T, AdapterError>,
{
    let attempts = config.max_retries.max(1);
    let mut attempt = 1;

    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts && err.is_retryable() => {
                warn!(
                    "[call_with_retry] attempt {}/{} failed: {}",
                    attempt, attempts, err
                );
                thread::sleep(config.sleep);
                attempt += 1;
            }
            Err(err) if attempt > 1 => return Err(AdapterError::retry_exhausted(attempt, err)),
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::cell::Cell;

    fn unavailable() -> AdapterError {
        AdapterError::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "busy".into(),
        }
    }

    #[test]
    fn single_attempt_returns_the_raw_error() {
        let calls = Cell::new(0);
        let result: Result<(), _> = call_with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(unavailable())
            },
            &RetryConfig::single_attempt(),
        );
        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(AdapterError::HttpStatus { .. })));
    }

    #[test]
    fn retries_transient_failures_until_success() {
        let calls = Cell::new(0);
        let result = call_with_retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(unavailable())
                } else {
                    Ok("done")
                }
            },
            &RetryConfig::new(3, Duration::ZERO),
        );
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn stops_on_permanent_failure() {
        let calls = Cell::new(0);
        let result: Result<(), _> = call_with_retry(
            || {
                calls.set(calls.get() + 1);
                Err(AdapterError::EmptyResponse)
            },
            &RetryConfig::new(5, Duration::ZERO),
        );
        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(AdapterError::EmptyResponse)));
    }

    #[test]
    fn exhausted_budget_reports_attempts() {
        let result: Result<(), _> =
            call_with_retry(|| Err(unavailable()), &RetryConfig::new(2, Duration::ZERO));
        match result {
            Err(AdapterError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
