//! Error types for Switchyard.

pub mod unified;

pub use unified::{ErrorBody, ErrorKind};

use thiserror::Error;

/// Primary error type for all Switchyard operations.
#[derive(Error, Debug)]
pub enum SwitchyardError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No provider candidates were supplied")]
    NoCandidates,

    #[error("Rate limit exceeded for '{key}'")]
    RateLimited { key: String, retry_after_ms: u64 },

    #[error("Server busy: admission queue for '{route}' is full")]
    ServerBusy { route: String },

    #[error("Timed out after {waited_ms}ms waiting for an admission slot on '{route}'")]
    QueueTimeout { route: String, waited_ms: u64 },

    #[error("Request aborted by client")]
    ClientAborted,

    #[error("Provider {provider}/{model} failed: {source}")]
    ProviderExecution {
        provider: String,
        model: String,
        #[source]
        source: Box<SwitchyardError>,
    },

    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Backend rate limited: retry after {retry_after_ms:?}ms")]
    BackendRateLimited { retry_after_ms: Option<u64> },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl SwitchyardError {
    /// Create a backend error from a status code and message.
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Wrap the last failure of an exhausted candidate list.
    pub fn provider_execution(
        provider: impl Into<String>,
        model: impl Into<String>,
        source: SwitchyardError,
    ) -> Self {
        Self::ProviderExecution {
            provider: provider.into(),
            model: model.into(),
            source: Box::new(source),
        }
    }

    /// Classify this error into its public kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::InvalidArgument(_)
            | Self::NoCandidates
            | Self::UnknownProvider(_)
            | Self::Serialization(_) => ErrorKind::ValidationError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ServerBusy { .. } => ErrorKind::ServerBusy,
            Self::QueueTimeout { .. } => ErrorKind::QueueTimeout,
            Self::ClientAborted => ErrorKind::ClientAborted,
            Self::ProviderExecution { .. } => ErrorKind::ProviderExecutionError,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::UnsupportedOperation(_) => ErrorKind::Unsupported,
            _ => ErrorKind::InternalError,
        }
    }

    /// HTTP status equivalent of [`Self::kind`].
    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Whether a backend signalled overload/throttling.
    ///
    /// This is the default classifier used by the fallback engine; it is
    /// distinct from admission-control [`SwitchyardError::RateLimited`].
    pub fn is_backend_rate_limited(&self) -> bool {
        match self {
            Self::BackendRateLimited { .. } => true,
            Self::Backend { status, .. } => *status == 429,
            _ => false,
        }
    }

    /// Public JSON body for CLI and HTTP surfaces.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SwitchyardError>;
