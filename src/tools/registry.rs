//! Explicitly constructed tool registry

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentLoopError, Result};

use super::Tool;
use super::catalog::{ToolCatalog, ToolSpec};

/// Lookup and description surface for registered tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; names must be unique and non-empty
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        let name = tool.name().to_string();
        if name.trim().is_empty() {
            return Err(AgentLoopError::Registry("tool name must not be empty".to_string()));
        }
        if self.tools.contains_key(&name) {
            return Err(AgentLoopError::Registry(format!("duplicate tool: {}", name)));
        }
        log::debug!("Registered tool {}", name);
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Specs for every tool, sorted by name
    pub fn describe_all(&self) -> Vec<ToolSpec> {
        self.snapshot().specs().to_vec()
    }

    /// Freeze the current tool set for one request
    pub fn snapshot(&self) -> ToolCatalog {
        ToolCatalog::new(
            self.tools
                .values()
                .map(|tool| ToolSpec {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                })
                .collect(),
        )
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
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
