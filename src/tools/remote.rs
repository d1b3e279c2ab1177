//! Remote tool servers: tools discovered at request time and invoked by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolExecutionContext};
use super::types::{ToolDefinition, ToolParameters};
use crate::error::SwitchyardError;

/// A collaborator that lists and invokes tools over some transport.
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, SwitchyardError>;

    async fn invoke(
        &self,
        name: &str,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, SwitchyardError>;
}

/// Exposes one tool of a [`ToolServer`] through the [`Tool`] trait.
pub struct RemoteTool {
    server: Arc<dyn ToolServer>,
    name: String,
    description: String,
    parameters: ToolParameters,
}

impl RemoteTool {
    pub fn new(server: Arc<dyn ToolServer>, definition: ToolDefinition) -> Self {
        Self {
            server,
            name: definition.name,
            description: definition.description,
            parameters: ToolParameters::from_schema(definition.parameters),
        }
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, SwitchyardError> {
        self.server.invoke(&self.name, args, ctx).await
    }
}

/// Tool servers keyed by the id requests refer to in `tool_servers`.
#[derive(Clone, Default)]
pub struct ToolServerRegistry {
    servers: BTreeMap<String, Arc<dyn ToolServer>>,
}

impl ToolServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, server: Arc<dyn ToolServer>) {
        self.servers.insert(id.into(), server);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ToolServer>> {
        self.servers.get(id).cloned()
    }

    /// Discover the tools of server `id` as executable [`Tool`]s.
    pub async fn tools_for(&self, id: &str) -> Result<Vec<Arc<dyn Tool>>, SwitchyardError> {
        let server = self
            .get(id)
            .ok_or_else(|| SwitchyardError::Validation(format!("unknown tool server '{id}'")))?;
        let definitions = server.list_tools().await?;
        tracing::debug!(server = id, count = definitions.len(), "discovered remote tools");
        Ok(definitions
            .into_iter()
            .map(|def| Arc::new(RemoteTool::new(server.clone(), def)) as Arc<dyn Tool>)
            .collect())
    }
}

impl std::fmt::Debug for ToolServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServerRegistry")
            .field("servers", &self.servers.keys().collect::<Vec<_>>())
            .finish()
    }
}
