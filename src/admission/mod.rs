//! Admission control at the service boundary: a per-route concurrency
//! limiter plus a per-client token bucket, both held separately by each route.

pub mod limiter;
pub mod rate_limit;

pub use limiter::{AdmissionSlot, ConcurrencyLimiter};
pub use rate_limit::RateLimiter;

use tokio_util::sync::CancellationToken;

use crate::config::{AdmissionConfig, RateLimitConfig, RouteLimits};
use crate::error::SwitchyardError;

/// Admission for one route.
#[derive(Debug, Clone)]
pub struct RouteAdmission {
    limiter: Option<ConcurrencyLimiter>,
    rate_limiter: RateLimiter,
}

impl RouteAdmission {
    pub fn new(route: &str, limits: &RouteLimits, rate_limiter: RateLimiter) -> Self {
        Self {
            limiter: limits
                .enabled
                .then(|| ConcurrencyLimiter::new(route, limits)),
            rate_limiter,
        }
    }

    /// No limits at all.
    pub fn open() -> Self {
        Self {
            limiter: None,
            rate_limiter: RateLimiter::disabled(),
        }
    }

    /// Rate-check `client_key`, then wait for a concurrency slot.
    pub async fn admit(
        &self,
        client_key: &str,
        cancel: &CancellationToken,
    ) -> Result<AdmissionSlot, SwitchyardError> {
        self.rate_limiter.check(client_key)?;
        match &self.limiter {
            Some(limiter) => limiter.acquire(cancel).await,
            None => Ok(AdmissionSlot::unlimited()),
        }
    }

    pub fn limiter(&self) -> Option<&ConcurrencyLimiter> {
        self.limiter.as_ref()
    }
}

/// One [`RouteAdmission`] per route group, each with its own buckets.
#[derive(Debug, Clone)]
pub struct AdmissionRoutes {
    pub run: RouteAdmission,
    pub stream: RouteAdmission,
    pub vector: RouteAdmission,
    pub embeddings: RouteAdmission,
}

impl AdmissionRoutes {
    pub fn new(admission: &AdmissionConfig, rate_limit: &RateLimitConfig) -> Self {
        let route = |name: &str, limits: &RouteLimits| {
            RouteAdmission::new(name, limits, RateLimiter::new(rate_limit))
        };
        Self {
            run: route("run", &admission.run),
            stream: route("stream", &admission.stream),
            vector: route("vector", &admission.vector),
            embeddings: route("embeddings", &admission.embeddings),
        }
    }

    pub fn open() -> Self {
        Self {
            run: RouteAdmission::open(),
            stream: RouteAdmission::open(),
            vector: RouteAdmission::open(),
            embeddings: RouteAdmission::open(),
        }
    }
}
