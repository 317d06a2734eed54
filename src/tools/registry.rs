use std::{collections::HashMap, sync::Arc};

use super::traits::{Tool, ToolSpec};

/// Central registry of available tools: `name -> (spec, handler)`.
///
/// Registration happens once at startup for the built-in tool catalog, and
/// additively afterward as MCP servers connect and advertise their tools.
/// A name is never silently replaced — re-registering an existing name is
/// a programmer error and fails loudly, unlike the teacher's
/// `ToolRegistry::register`, which overwrote on collision.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register `tool`. Fails if a tool with the same name is already
    /// registered; the existing registration is left untouched.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), String> {
        let name = tool.spec().name.clone();
        if self.tools.contains_key(&name) {
            return Err(format!("tool '{name}' is already registered"));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool's spec by name.
    pub fn get_spec(&self, name: &str) -> Result<ToolSpec, String> {
        self.tools
            .get(name)
            .map(|t| t.spec().clone())
            .ok_or_else(|| format!("tool '{name}' is not registered"))
    }

    /// Look up a tool's handler by name.
    pub fn handler(&self, name: &str) -> Result<Arc<dyn Tool>, String> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| format!("tool '{name}' is not registered"))
    }

    /// List every registered tool's spec. Order is not significant.
    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
