//! Public error classification shared by the CLI and HTTP surfaces.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    RateLimited,
    ServerBusy,
    QueueTimeout,
    ClientAborted,
    ProviderExecutionError,
    Timeout,
    Unsupported,
    InternalError,
}

impl ErrorKind {
    /// HTTP status used when the error crosses the service boundary.
    pub fn http_status(self) -> u16 {
        match self {
            Self::ValidationError => 400,
            Self::RateLimited => 429,
            Self::ServerBusy | Self::QueueTimeout => 503,
            Self::ClientAborted => 499,
            Self::ProviderExecutionError => 502,
            Self::Timeout => 504,
            Self::Unsupported => 501,
            Self::InternalError => 500,
        }
    }
}

/// Structured error payload; never carries a backtrace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}
