//! Vector-store collaborator behind `/vector/*`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::SwitchyardError;
use crate::types::ProviderCandidate;

/// An operation against a vector store. `params` is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VectorRequest {
    pub operation: String,
    #[serde(default)]
    pub params: Value,
}

/// Body of `/vector/embeddings/run`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsRequest {
    pub candidates: Vec<ProviderCandidate>,
    pub inputs: Vec<String>,
}

pub type VectorStream = BoxStream<'static, Result<Value, SwitchyardError>>;

#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn run(
        &self,
        request: VectorRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, SwitchyardError>;

    async fn stream(
        &self,
        request: VectorRequest,
        cancel: &CancellationToken,
    ) -> Result<VectorStream, SwitchyardError>;
}

/// Used when no vector store is wired in; every call is `unsupported`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredVectorBackend;

#[async_trait]
impl VectorBackend for UnconfiguredVectorBackend {
    async fn run(
        &self,
        request: VectorRequest,
        _cancel: &CancellationToken,
    ) -> Result<Value, SwitchyardError> {
        Err(unconfigured(&request))
    }

    async fn stream(
        &self,
        request: VectorRequest,
        _cancel: &CancellationToken,
    ) -> Result<VectorStream, SwitchyardError> {
        Err(unconfigured(&request))
    }
}

fn unconfigured(request: &VectorRequest) -> SwitchyardError {
    SwitchyardError::UnsupportedOperation(format!(
        "vector operation '{}' requires a configured vector backend",
        request.operation
    ))
}
