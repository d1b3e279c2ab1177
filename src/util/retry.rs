//! Per-candidate retry with exponential backoff and a rate-limit schedule.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SwitchyardError;
use crate::types::RetryOverrides;

/// Upper bound for any single backoff sleep.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(600);

/// Seconds to a backoff delay, clamped to `0..=MAX_RETRY_DELAY`. NaN is zero.
pub fn delay_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// Retry policy for one candidate.
///
/// Standard failures back off exponentially (`base_delay * multiplier^n`)
/// until `max_attempts` standard attempts are used. Rate-limited failures
/// consume `rate_limit_schedule` in order and are counted separately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of standard attempts (including the first). At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub rate_limit_schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            rate_limit_schedule: [5, 10, 20].into_iter().map(Duration::from_secs).collect(),
        }
    }
}

/// Failure counters kept while retrying one candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounters {
    pub standard_failures: u32,
    pub rate_limit_failures: u32,
}

/// One failed attempt, as reported to a [`RetryObserver`].
#[derive(Debug, Clone)]
pub struct AttemptReport<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    /// 1-based attempt number on this candidate.
    pub attempt: u32,
    pub rate_limited: bool,
    pub next_delay: Option<Duration>,
    pub will_retry: bool,
    pub error: &'a SwitchyardError,
}

/// Observability hook for failed attempts. Never affects control flow.
pub trait RetryObserver: Send + Sync {
    fn on_failed_attempt(&self, report: &AttemptReport<'_>);
}

/// Default observer: one `warn!` per failed attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_failed_attempt(&self, report: &AttemptReport<'_>) {
        tracing::warn!(
            provider = report.provider,
            model = report.model,
            attempt = report.attempt,
            rate_limited = report.rate_limited,
            next_delay_ms = report.next_delay.map(|d| d.as_millis() as u64),
            will_retry = report.will_retry,
            error = %report.error,
            "model call attempt failed"
        );
    }
}

impl RetryPolicy {
    /// Apply per-candidate overrides on top of this policy.
    pub fn with_overrides(&self, overrides: Option<&RetryOverrides>) -> Self {
        let Some(o) = overrides else {
            return self.clone();
        };
        Self {
            max_attempts: o.max_attempts.unwrap_or(self.max_attempts).max(1),
            base_delay: o
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.base_delay),
            multiplier: o.multiplier.unwrap_or(self.multiplier),
            rate_limit_schedule: o
                .rate_limit_schedule_secs
                .as_ref()
                .map(|s| s.iter().copied().map(delay_from_secs).collect())
                .unwrap_or_else(|| self.rate_limit_schedule.clone()),
        }
    }

    /// Delay before the next attempt, or `None` when the candidate is spent.
    pub fn next_delay(&self, counters: &RetryCounters, rate_limited: bool) -> Option<Duration> {
        if rate_limited {
            self.rate_limit_schedule
                .get(counters.rate_limit_failures as usize)
                .copied()
        } else if counters.standard_failures < self.max_attempts.saturating_sub(1) {
            let factor = self.multiplier.powi(counters.standard_failures as i32);
            Some(delay_from_secs(self.base_delay.as_secs_f64() * factor))
        } else {
            None
        }
    }

    /// Run `operation` until it succeeds or this candidate's retries are spent.
    ///
    /// Cancellation interrupts both the operation and backoff sleeps with
    /// [`SwitchyardError::ClientAborted`], which is never retried.
    pub async fn execute<F, Fut, T>(
        &self,
        candidate: (&str, &str),
        is_rate_limited: &(dyn Fn(&SwitchyardError) -> bool + Send + Sync),
        observer: &dyn RetryObserver,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, SwitchyardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwitchyardError>>,
    {
        let (provider, model) = candidate;
        let mut counters = RetryCounters::default();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SwitchyardError::ClientAborted),
                outcome = operation() => outcome,
            };
            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(SwitchyardError::ClientAborted) => return Err(SwitchyardError::ClientAborted),
                Err(e) => e,
            };

            let rate_limited = is_rate_limited(&error);
            let next_delay = self.next_delay(&counters, rate_limited);
            observer.on_failed_attempt(&AttemptReport {
                provider,
                model,
                attempt,
                rate_limited,
                next_delay,
                will_retry: next_delay.is_some(),
                error: &error,
            });

            let Some(delay) = next_delay else {
                return Err(error);
            };
            if rate_limited {
                counters.rate_limit_failures += 1;
            } else {
                counters.standard_failures += 1;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SwitchyardError::ClientAborted),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
