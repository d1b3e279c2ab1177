//! Utility modules: retry, fallback, timeout.

pub mod fallback;
pub mod retry;
pub mod timeout;

pub use fallback::FallbackEngine;
pub use retry::{AttemptReport, RetryCounters, RetryObserver, RetryPolicy, TracingRetryObserver};
