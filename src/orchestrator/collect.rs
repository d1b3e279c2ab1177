//! Effective tool set for one call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::SwitchyardError;
use crate::tools::{Tool, ToolDefinition, ToolNameTable, ToolRegistry, ToolServerRegistry};
use crate::types::{CallSpec, ToolChoice};

/// One advertised tool.
#[derive(Clone)]
pub struct ToolEntry {
    pub original: String,
    /// Definition under its sanitized name.
    pub definition: ToolDefinition,
    /// `None` for declared tools nothing local can run.
    pub executor: Option<Arc<dyn Tool>>,
}

/// Tools merged from the call's declarations, named functions and tool
/// servers, in that order, keyed by sanitized name.
#[derive(Clone, Default)]
pub struct ToolSet {
    names: ToolNameTable,
    entries: Vec<ToolEntry>,
    by_sanitized: HashMap<String, usize>,
}

impl ToolSet {
    pub async fn collect(
        spec: &CallSpec,
        registry: &ToolRegistry,
        servers: &ToolServerRegistry,
    ) -> Result<Self, SwitchyardError> {
        let mut set = Self::default();

        for definition in &spec.tools {
            let executor = registry.get(&definition.name);
            if executor.is_none() {
                tracing::debug!(tool = %definition.name, "declared tool has no local executor");
            }
            set.add(definition.clone(), executor)?;
        }

        for name in &spec.functions {
            let tool = registry
                .get(name)
                .ok_or_else(|| SwitchyardError::Validation(format!("unknown function '{name}'")))?;
            set.add(tool.definition(), Some(tool))?;
        }

        for server_id in &spec.tool_servers {
            for tool in servers.tools_for(server_id).await? {
                set.add(tool.definition(), Some(tool))?;
            }
        }

        Ok(set)
    }

    /// Add one tool. The same original name twice keeps the first entry.
    pub fn add(
        &mut self,
        definition: ToolDefinition,
        executor: Option<Arc<dyn Tool>>,
    ) -> Result<(), SwitchyardError> {
        let original = definition.name.clone();
        if self.names.sanitized(&original).is_some() {
            tracing::warn!(tool = %original, "duplicate tool definition ignored");
            return Ok(());
        }
        let sanitized = self.names.insert(&original)?;
        self.by_sanitized.insert(sanitized.clone(), self.entries.len());
        self.entries.push(ToolEntry {
            original,
            definition: definition.renamed(sanitized),
            executor,
        });
        Ok(())
    }

    pub fn get(&self, sanitized: &str) -> Option<&ToolEntry> {
        self.by_sanitized.get(sanitized).map(|&i| &self.entries[i])
    }

    /// Name the caller used for a tool the model called as `sanitized`.
    pub fn original_name<'a>(&'a self, sanitized: &'a str) -> &'a str {
        self.names.original(sanitized).unwrap_or(sanitized)
    }

    /// Definitions as advertised to backends.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.definition.clone()).collect()
    }

    /// Rewrite a `function` tool choice to the sanitized name.
    pub fn resolve_choice(&self, choice: &ToolChoice) -> Result<ToolChoice, SwitchyardError> {
        match choice {
            ToolChoice::Function { name } => {
                let sanitized = self
                    .names
                    .sanitized(name)
                    .or_else(|| self.get(name).map(|e| e.definition.name.as_str()))
                    .ok_or_else(|| {
                        SwitchyardError::Validation(format!(
                            "tool_choice names unknown tool '{name}'"
                        ))
                    })?;
                Ok(ToolChoice::Function {
                    name: sanitized.to_string(),
                })
            }
            other => Ok(other.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.definition.name))
            .finish()
    }
}
