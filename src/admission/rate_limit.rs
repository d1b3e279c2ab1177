//! Per-key token bucket.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::SwitchyardError;

/// Buckets are pruned once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 10_000;

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Token bucket per client key: `burst` capacity, continuous refill of
/// `requests_per_minute / 60` tokens per second.
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    burst: f64,
    per_second: f64,
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            burst: f64::from(config.burst.max(1)),
            per_second: f64::from(config.requests_per_minute) / 60.0,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn disabled() -> Self {
        Self::new(&RateLimitConfig {
            enabled: false,
            ..Default::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Take one token for `key` or fail with [`SwitchyardError::RateLimited`].
    pub fn check(&self, key: &str) -> Result<(), SwitchyardError> {
        if !self.enabled {
            return Ok(());
        }
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        if buckets.len() >= PRUNE_THRESHOLD && !buckets.contains_key(key) {
            self.prune(&mut buckets, now);
        }
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.burst);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let retry_after_ms = if self.per_second > 0.0 {
            ((1.0 - bucket.tokens) / self.per_second * 1000.0).ceil() as u64
        } else {
            u64::MAX
        };
        tracing::debug!(key, retry_after_ms, "rate limited");
        Err(SwitchyardError::RateLimited {
            key: key.to_string(),
            retry_after_ms,
        })
    }

    /// Drop buckets that would be full by now; they carry no state.
    fn prune(&self, buckets: &mut HashMap<String, Bucket>, now: Instant) {
        let before = buckets.len();
        buckets.retain(|_, b| {
            let elapsed = now.saturating_duration_since(b.last).as_secs_f64();
            b.tokens + elapsed * self.per_second < self.burst
        });
        tracing::debug!(before, after = buckets.len(), "pruned rate limit buckets");
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.enabled)
            .field("burst", &self.burst)
            .field("per_second", &self.per_second)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(burst: u32, requests_per_minute: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute,
            burst,
            trust_proxy_headers: false,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_one_refills_after_a_second() {
        let limiter = limiter(1, 60);
        limiter.check("10.0.0.1").unwrap();

        let err = limiter.check("10.0.0.1").unwrap_err();
        match err {
            SwitchyardError::RateLimited { retry_after_ms, .. } => assert_eq!(retry_after_ms, 1000),
            other => panic!("unexpected error: {other}"),
        }

        tokio::time::advance(Duration::from_millis(1000)).await;
        limiter.check("10.0.0.1").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keys_have_independent_buckets() {
        let limiter = limiter(1, 60);
        limiter.check("a").unwrap();
        limiter.check("b").unwrap();
        assert!(limiter.check("a").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_burst() {
        let limiter = limiter(2, 60);
        tokio::time::advance(Duration::from_secs(60)).await;
        limiter.check("k").unwrap();
        limiter.check("k").unwrap();
        assert!(limiter.check("k").is_err());
    }

    #[test]
    fn disabled_limiter_never_rejects() {
        let limiter = RateLimiter::disabled();
        for _ in 0..100 {
            limiter.check("k").unwrap();
        }
    }
}
