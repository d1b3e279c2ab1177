//! Ordered provider fallback on top of [`RetryPolicy`].

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::retry::{RetryObserver, RetryPolicy, TracingRetryObserver};
use crate::error::SwitchyardError;
use crate::types::ProviderCandidate;

type RateLimitClassifier = dyn Fn(&SwitchyardError) -> bool + Send + Sync;

/// Runs one operation against candidates in order until one succeeds.
#[derive(Clone)]
pub struct FallbackEngine {
    policy: RetryPolicy,
    is_rate_limited: Arc<RateLimitClassifier>,
    observer: Arc<dyn RetryObserver>,
}

impl FallbackEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            is_rate_limited: Arc::new(SwitchyardError::is_backend_rate_limited),
            observer: Arc::new(TracingRetryObserver),
        }
    }

    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&SwitchyardError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_rate_limited = Arc::new(classifier);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation` per candidate, returning the winning index.
    ///
    /// Exhausting every candidate yields [`SwitchyardError::ProviderExecution`]
    /// tagged with the last candidate tried.
    pub async fn execute<F, Fut, T>(
        &self,
        candidates: &[ProviderCandidate],
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<(usize, T), SwitchyardError>
    where
        F: FnMut(usize, &ProviderCandidate) -> Fut,
        Fut: Future<Output = Result<T, SwitchyardError>>,
    {
        if candidates.is_empty() {
            return Err(SwitchyardError::NoCandidates);
        }

        let mut last_error = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let policy = self.policy.with_overrides(candidate.retry.as_ref());
            tracing::debug!(
                provider = %candidate.provider,
                model = %candidate.model,
                index,
                "trying candidate"
            );
            let result = policy
                .execute(
                    (&candidate.provider, &candidate.model),
                    self.is_rate_limited.as_ref(),
                    self.observer.as_ref(),
                    cancel,
                    || operation(index, candidate),
                )
                .await;
            match result {
                Ok(value) => return Ok((index, value)),
                Err(SwitchyardError::ClientAborted) => return Err(SwitchyardError::ClientAborted),
                Err(error) => {
                    tracing::info!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        error = %error,
                        "candidate exhausted, falling back"
                    );
                    last_error = Some((candidate, error));
                }
            }
        }

        match last_error {
            Some((candidate, error)) => Err(SwitchyardError::provider_execution(
                &candidate.provider,
                &candidate.model,
                error,
            )),
            None => Err(SwitchyardError::NoCandidates),
        }
    }
}

impl Default for FallbackEngine {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl std::fmt::Debug for FallbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackEngine")
            .field("policy", &self.policy)
            .finish()
    }
}
