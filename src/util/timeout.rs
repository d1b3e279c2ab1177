//! Timeout helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::SwitchyardError;

/// Bound a fallible future by `limit`; `None` means no limit.
pub async fn with_timeout<T>(
    limit: Option<Duration>,
    future: impl Future<Output = Result<T, SwitchyardError>>,
) -> Result<T, SwitchyardError> {
    let Some(limit) = limit else {
        return future.await;
    };
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(SwitchyardError::Timeout(limit.as_millis() as u64)),
    }
}
