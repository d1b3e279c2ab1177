//! Named local tools available to requests via `functions`.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::tool::Tool;

/// Local tools keyed by their original name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in super::builtin::all_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Add a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_by_name() {
        let registry = ToolRegistry::with_builtins();
        assert!(registry.get("current_time").is_some());
        assert!(registry.get("random_uuid").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["current_time", "random_uuid"]
        );
    }
}
