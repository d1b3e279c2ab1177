//! Model backends: the [`ModelProvider`] trait, its registry and concrete variants.

pub mod http;
pub mod local;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::SwitchyardError;
use crate::tools::ToolDefinition;
use crate::types::{GenerationSettings, ModelChunk, ModelMessage, ModelResponse, ToolChoice};

/// One model call as seen by a backend.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub messages: Vec<ModelMessage>,
    /// Tools under their sanitized names. Empty when tools are withheld.
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub settings: GenerationSettings,
}

/// Stream of chunks for one streaming model call.
pub type ChunkStream = BoxStream<'static, Result<ModelChunk, SwitchyardError>>;

/// A model backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Backend id as referenced by candidates.
    fn name(&self) -> &str;

    /// Non-streaming call.
    async fn call(&self, model: &str, request: &ModelRequest)
        -> Result<ModelResponse, SwitchyardError>;

    /// Open a streaming call. Errors before the first chunk are returned here.
    async fn stream(&self, model: &str, request: &ModelRequest)
        -> Result<ChunkStream, SwitchyardError>;

    /// Embed `inputs`, one vector per input.
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, SwitchyardError> {
        let _ = (model, inputs);
        Err(SwitchyardError::UnsupportedOperation(format!(
            "backend '{}' does not support embeddings",
            self.name()
        )))
    }
}

/// Closed set of configurable backend variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum BackendConfig {
    OpenaiCompatible {
        base_url: String,
        /// Environment variable holding the API key; defaults to `<ID>_API_KEY`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key_env: Option<String>,
    },
    Local,
}

impl BackendConfig {
    /// Instantiate the backend registered under `id`.
    pub fn build(&self, id: &str) -> Result<Arc<dyn ModelProvider>, SwitchyardError> {
        match self {
            #[cfg(feature = "openai-compatible")]
            Self::OpenaiCompatible {
                base_url,
                api_key_env,
            } => {
                let key_var = api_key_env.clone().unwrap_or_else(|| default_api_key_env(id));
                let api_key = std::env::var(&key_var).ok().filter(|key| !key.is_empty());
                if api_key.is_none() {
                    tracing::debug!(provider = id, env = %key_var, "no API key set");
                }
                Ok(Arc::new(openai_compatible::OpenAiCompatibleProvider::new(
                    id,
                    base_url.clone(),
                    api_key,
                )))
            }
            #[cfg(not(feature = "openai-compatible"))]
            Self::OpenaiCompatible { .. } => Err(SwitchyardError::Configuration(format!(
                "provider '{id}' needs the openai-compatible feature"
            ))),
            Self::Local => Ok(Arc::new(local::LocalProvider::new(id))),
        }
    }
}

/// `openai` -> `OPENAI_API_KEY`, `my-proxy` -> `MY_PROXY_API_KEY`.
pub fn default_api_key_env(id: &str) -> String {
    let mut var: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    var.push_str("_API_KEY");
    var
}

/// Backends keyed by provider id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ModelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(
        configs: &BTreeMap<String, BackendConfig>,
    ) -> Result<Self, SwitchyardError> {
        let mut registry = Self::new();
        for (id, config) in configs {
            registry.register_as(id.clone(), config.build(id)?);
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn ModelProvider>) {
        self.providers
            .insert(provider.name().to_string(), provider);
    }

    pub fn register_as(&mut self, id: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        self.providers.insert(id.into(), provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn ModelProvider>, SwitchyardError> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| SwitchyardError::UnknownProvider(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_config_parses_tagged_variants() {
        let cfg: BackendConfig = toml::from_str(
            r#"
kind = "openai_compatible"
base_url = "http://localhost:8080/v1"
api_key_env = "MY_KEY"
"#,
        )
        .unwrap();
        assert!(matches!(cfg, BackendConfig::OpenaiCompatible { .. }));

        let local: BackendConfig = toml::from_str(r#"kind = "local""#).unwrap();
        assert_eq!(local, BackendConfig::Local);
    }

    #[test]
    fn api_key_env_defaults_from_id() {
        assert_eq!(default_api_key_env("openai"), "OPENAI_API_KEY");
        assert_eq!(default_api_key_env("my-proxy"), "MY_PROXY_API_KEY");
    }

    #[test]
    fn registry_reports_unknown_provider() {
        let mut configs = BTreeMap::new();
        configs.insert("dev".to_string(), BackendConfig::Local);
        let registry = ProviderRegistry::from_configs(&configs).unwrap();
        assert!(registry.get("dev").is_ok());
        assert!(matches!(
            registry.get("prod"),
            Err(SwitchyardError::UnknownProvider(_))
        ));
    }
}
