//! Request orchestration: provider fallback, the tool loop and streaming.
//!
//! An [`Orchestrator`] is built once from configuration and shared by every
//! request. Each call gets its own [`state::LoopState`]; nothing is kept
//! between calls.

pub mod aggregate;
pub mod collect;
pub mod dispatch;
pub mod events;
pub mod prepare;
mod runner;
pub mod state;
mod stream;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub use aggregate::{ResponseAggregate, TurnAggregator};
pub use collect::ToolSet;
pub use dispatch::{dispatch_batch, DispatchedCall};
pub use events::{StreamEvent, ToolEvent};
pub use stream::EventStream;

use crate::config::{SwitchyardConfig, ToolLoopConfig};
use crate::error::SwitchyardError;
use crate::provider::ProviderRegistry;
use crate::tools::{ToolRegistry, ToolServerRegistry};
use crate::types::ProviderCandidate;
use crate::util::{FallbackEngine, RetryObserver};

/// Shared entry point for `run`, `stream` and `embed`.
#[derive(Clone, Debug)]
pub struct Orchestrator {
    pub(crate) providers: Arc<ProviderRegistry>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) tool_servers: Arc<ToolServerRegistry>,
    pub(crate) engine: FallbackEngine,
    pub(crate) tool_loop: ToolLoopConfig,
}

/// Result of an embeddings call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingResponse {
    pub provider: String,
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
}

impl Orchestrator {
    pub fn new(providers: ProviderRegistry, engine: FallbackEngine) -> Self {
        Self {
            providers: Arc::new(providers),
            tools: Arc::new(ToolRegistry::with_builtins()),
            tool_servers: Arc::new(ToolServerRegistry::new()),
            engine,
            tool_loop: ToolLoopConfig::default(),
        }
    }

    /// Providers from `config.providers`, built-in tools, no tool servers.
    pub fn from_config(config: &SwitchyardConfig) -> Result<Self, SwitchyardError> {
        let providers = ProviderRegistry::from_configs(&config.providers)?;
        Ok(Self::new(providers, FallbackEngine::new(config.retry.policy()))
            .with_tool_loop(config.tool_loop.clone()))
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_tool_servers(mut self, servers: ToolServerRegistry) -> Self {
        self.tool_servers = Arc::new(servers);
        self
    }

    pub fn with_tool_loop(mut self, tool_loop: ToolLoopConfig) -> Self {
        self.tool_loop = tool_loop;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.engine = self.engine.with_observer(observer);
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Embed `inputs` with the first candidate that succeeds.
    pub async fn embed(
        &self,
        candidates: &[ProviderCandidate],
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<EmbeddingResponse, SwitchyardError> {
        if inputs.is_empty() {
            return Err(SwitchyardError::Validation("no inputs to embed".into()));
        }
        for candidate in candidates {
            self.providers.get(&candidate.provider)?;
            if let Some(retry) = &candidate.retry {
                retry.validate()?;
            }
        }
        let (index, embeddings) = self
            .engine
            .execute(candidates, cancel, |_, candidate| {
                let provider = self.providers.get(&candidate.provider);
                let model = candidate.model.clone();
                let inputs = inputs.to_vec();
                async move { provider?.embed(&model, &inputs).await }
            })
            .await?;
        let winner = &candidates[index];
        Ok(EmbeddingResponse {
            provider: winner.provider.clone(),
            model: winner.model.clone(),
            embeddings,
        })
    }
}
