//! Bounded retry with exponential backoff and jitter.
//!
//! Errors are classified from their message text so any fallible async
//! operation can be wrapped, whatever its error type: network, timeout,
//! `429` and `5xx` failures are retried; other `4xx` codes and validation
//! failures propagate on the first occurrence.

use std::fmt::Display;
use std::future::Future;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::Serialize;

/// Retry policy for one class of operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total tries, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Delays are randomized by ± this fraction.
    pub jitter_factor: f64,
}

impl RetryConfig {
    /// Calls to the external generation backend.
    pub const EXTERNAL_API: RetryConfig = RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(2_000),
        max_delay: Duration::from_millis(30_000),
        jitter_factor: 0.2,
    };

    /// Calls to the assessment store.
    pub const STORAGE: RetryConfig = RetryConfig {
        max_attempts: 2,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_millis(5_000),
        jitter_factor: 0.1,
    };

    /// Un-jittered delay before the retry that follows `attempt` (1-based):
    /// `min(base_delay * 2^(attempt-1), max_delay)`.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay with jitter applied. `sample` is in `[-1.0, 1.0]`.
    pub fn jittered_delay(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.base_delay_for(attempt).as_secs_f64();
        let factor = 1.0 + self.jitter_factor * sample.clamp(-1.0, 1.0);
        Duration::from_secs_f64((base * factor).max(0.0))
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let sample = rand::thread_rng().gen_range(-1.0..=1.0);
        self.jittered_delay(attempt, sample)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::EXTERNAL_API
    }
}

/// Whether an error is worth another try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
}

impl Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Retryable => f.write_str("retryable"),
            ErrorClass::NonRetryable => f.write_str("non_retryable"),
        }
    }
}

static RATE_LIMITED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\bstatus\s+)429\b|too\s+many\s+requests").expect("valid regex")
});

/// An HTTP status, either leading the message ("503 Service Unavailable")
/// or introduced by "status". Bare numbers elsewhere (ports, durations in a
/// response body) are not statuses.
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\bstatus\s+)([45])\d{2}\b").expect("valid regex"));

static VALIDATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvalidation\b|\binvalid\s+(?:input|request|identifier|argument|parameter)s?\b")
        .expect("valid regex")
});

static TRANSIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:network|timeout|timed\s+out|econnreset|econnrefused|etimedout|connection\s+(?:reset|refused|closed|aborted)|socket\s+hang\s+up|temporarily\s+unavailable|service\s+unavailable|bad\s+gateway|database\s+is\s+(?:locked|busy))\b",
    )
    .expect("valid regex")
});

/// Classify an error by its message.
///
/// Order matters: `429` wins over other statuses, and a status wins over
/// free-text hints. Anything unrecognized is not retried.
pub fn classify_error(message: &str) -> ErrorClass {
    if RATE_LIMITED_RE.is_match(message) {
        return ErrorClass::Retryable;
    }
    if let Some(class) = STATUS_RE.captures(message).and_then(|c| c.get(1)) {
        return match class.as_str() {
            "5" => ErrorClass::Retryable,
            _ => ErrorClass::NonRetryable,
        };
    }
    if VALIDATION_RE.is_match(message) {
        return ErrorClass::NonRetryable;
    }
    if TRANSIENT_RE.is_match(message) {
        return ErrorClass::Retryable;
    }
    ErrorClass::NonRetryable
}

/// What the executor observed for one try of the operation.
#[derive(Debug)]
pub struct AttemptReport<'a, T, E> {
    pub operation: &'a str,
    /// 1-based index within this executor call.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcome: Result<&'a T, &'a E>,
    /// `None` on success.
    pub error_class: Option<ErrorClass>,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` tries are used up. The last error is returned on
/// exhaustion; deciding what to do next is the caller's job.
pub async fn execute_with_retry<T, E, F, Fut>(
    operation_name: &str,
    config: &RetryConfig,
    operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    execute_with_retry_observed(operation_name, config, operation, |_| {}).await
}

/// Same as [`execute_with_retry`], reporting every try to `observe` before
/// the retry decision is made.
pub async fn execute_with_retry_observed<T, E, F, Fut, O>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
    mut observe: O,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    O: FnMut(&AttemptReport<'_, T, E>),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let started_at = Utc::now();
        let clock = Instant::now();
        let result = operation(attempt).await;
        let elapsed = clock.elapsed();
        let error_class = result
            .as_ref()
            .err()
            .map(|e| classify_error(&e.to_string()));

        observe(&AttemptReport {
            operation: operation_name,
            attempt,
            started_at,
            finished_at: Utc::now(),
            elapsed,
            outcome: result.as_ref(),
            error_class,
        });

        let err = match result {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                } else {
                    tracing::debug!(
                        operation = operation_name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Operation succeeded"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let class = error_class.unwrap_or(ErrorClass::NonRetryable);
        if class == ErrorClass::NonRetryable {
            tracing::warn!(
                operation = operation_name,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                error_class = %class,
                error = %err,
                "Operation failed with non-retryable error"
            );
            return Err(err);
        }

        if attempt >= max_attempts {
            tracing::warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                error_class = %class,
                error = %err,
                "Operation failed, retry attempts exhausted"
            );
            return Err(err);
        }

        let delay = config.next_delay(attempt);
        tracing::warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            delay_ms = delay.as_millis() as u64,
            error_class = %class,
            error = %err,
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter_factor: 0.2,
        }
    }

    // ── classification ─────────────────────────────────────────

    #[test]
    fn transport_failures_are_retryable() {
        for msg in [
            "network error: backend unreachable",
            "generation call timed out after 45000ms",
            "read ECONNRESET",
            "connection reset by peer",
            "socket hang up",
            "429 Too Many Requests",
            "503 Service Unavailable",
            "backend returned status 500: boom",
            "database is locked",
        ] {
            assert_eq!(classify_error(msg), ErrorClass::Retryable, "{msg}");
        }
    }

    #[test]
    fn client_and_validation_failures_are_not_retryable() {
        for msg in [
            "404 Not Found",
            "400 Bad Request",
            "backend returned status 401: unauthorized",
            "validation error: invalid assessment identifier ''",
            "invalid request body",
        ] {
            assert_eq!(classify_error(msg), ErrorClass::NonRetryable, "{msg}");
        }
    }

    #[test]
    fn numbers_outside_status_position_are_not_statuses() {
        assert_eq!(
            classify_error("backend returned status 503: model loading, retry in 400 ms"),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify_error("network error: backend unreachable at https://ollama.internal:443"),
            ErrorClass::Retryable
        );
        assert_eq!(
            classify_error("backend returned status 404: retry after 500 ms will not help"),
            ErrorClass::NonRetryable
        );
    }

    #[test]
    fn unrecognized_errors_are_not_retried() {
        assert_eq!(classify_error("something odd happened"), ErrorClass::NonRetryable);
    }

    // ── delays ─────────────────────────────────────────────────

    #[test]
    fn base_delay_doubles_and_caps() {
        let config = RetryConfig::EXTERNAL_API;
        assert_eq!(config.base_delay_for(1), Duration::from_millis(2_000));
        assert_eq!(config.base_delay_for(2), Duration::from_millis(4_000));
        assert_eq!(config.base_delay_for(3), Duration::from_millis(8_000));
        assert_eq!(config.base_delay_for(5), Duration::from_millis(30_000));
        assert_eq!(config.base_delay_for(40), Duration::from_millis(30_000));
    }

    #[test]
    fn jitter_bounds_follow_factor() {
        let config = RetryConfig::EXTERNAL_API;
        let high = config.jittered_delay(1, 1.0).as_secs_f64();
        let low = config.jittered_delay(1, -1.0).as_secs_f64();
        assert!((high - 2.4).abs() < 1e-6, "high = {high}");
        assert!((low - 1.6).abs() < 1e-6, "low = {low}");
        assert_eq!(config.jittered_delay(1, 0.0), Duration::from_millis(2_000));
    }

    #[test]
    fn random_delay_stays_in_window() {
        let config = RetryConfig::STORAGE;
        for _ in 0..50 {
            let d = config.next_delay(1).as_secs_f64();
            assert!((0.45 - 1e-9..=0.55 + 1e-9).contains(&d), "delay = {d}");
        }
    }

    #[test]
    fn presets_match_policy() {
        assert_eq!(RetryConfig::EXTERNAL_API.max_attempts, 3);
        assert_eq!(RetryConfig::STORAGE.max_attempts, 2);
        assert_eq!(RetryConfig::STORAGE.max_delay, Duration::from_millis(5_000));
        assert!((RetryConfig::STORAGE.jitter_factor - 0.1).abs() < f64::EPSILON);
    }

    // ── executor ───────────────────────────────────────────────

    #[tokio::test]
    async fn success_on_first_try_calls_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<u32, String> = execute_with_retry("op", &fast_config(3), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_calls_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), String> = execute_with_retry("op", &fast_config(3), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("404 Not Found".to_string())
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), "404 Not Found");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempt_cap_is_enforced_exactly() {
        // Three 503s then a success that is never reached
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, String> = execute_with_retry("op", &fast_config(3), move |_| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 3 {
                    Err(format!("503 Service Unavailable (call {n})"))
                } else {
                    Ok("late success")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap_err(), "503 Service Unavailable (call 3)");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retryable_failures_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<&str, String> = execute_with_retry("op", &fast_config(3), move |_| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("connection reset".to_string())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn observer_sees_every_attempt_in_order() {
        let mut seen: Vec<(u32, Option<ErrorClass>)> = Vec::new();
        let result: Result<u32, String> = execute_with_retry_observed(
            "op",
            &fast_config(3),
            |attempt| async move {
                if attempt == 1 {
                    Err("timeout".to_string())
                } else {
                    Ok(attempt)
                }
            },
            |report| {
                assert!(report.finished_at >= report.started_at);
                seen.push((report.attempt, report.error_class));
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(seen, vec![(1, Some(ErrorClass::Retryable)), (2, None)]);
    }

    #[tokio::test]
    async fn zero_max_attempts_still_tries_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let _: Result<(), String> = execute_with_retry("op", &fast_config(0), move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("503".to_string())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
