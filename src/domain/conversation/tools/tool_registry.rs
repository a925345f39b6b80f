//! Tool Registry - the closed set of tools the model may invoke.
//!
//! Built once at startup and shared by reference. Nothing registers tools
//! at runtime, so lookups never observe a partially built registry.

use std::collections::BTreeMap;

use super::tool_call::ToolName;
use super::tool_definition::ToolDefinition;

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, ToolDefinition>,
}

impl ToolRegistry {
    /// Builds a registry from explicit definitions.
    pub fn from_definitions(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        Self {
            tools: definitions.into_iter().map(|d| (d.name(), d)).collect(),
        }
    }

    /// Registry holding the four intake tools.
    pub fn standard() -> Self {
        Self::from_definitions(ToolDefinition::standard_set())
    }

    pub fn get(&self, name: ToolName) -> Option<&ToolDefinition> {
        self.tools.get(&name)
    }

    /// Looks a tool up by its wire name.
    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        name.parse::<ToolName>().ok().and_then(|n| self.get(n))
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Definitions in stable name order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
