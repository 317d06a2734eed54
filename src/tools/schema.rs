//! Rendering of registered tools for LLM API requests.
//!
//! Grounded in the teacher's `tools::schema::generate_tool_schema_text`
//! (same idea: turn a registry into something the provider understands)
//! but targets the native `tools: [{name, description, parameters}]`
//! protocol field rather than a markdown block injected into the prompt —
//! this crate's LLM client advertises tools the way the provider's own
//! tool-calling API expects, per spec.md §4.6/§6.

use serde_json::{Value, json};

use super::registry::ToolRegistry;
use super::traits::ToolSpec;

/// One entry of the `tools` array sent to the provider.
pub fn tool_spec_to_llm_json(spec: &ToolSpec) -> Value {
    json!({
        "name": spec.name,
        "description": spec.description,
        "parameters": spec.args_schema,
    })
}

/// Render every registered tool as the provider-facing `tools` array.
/// Order is not significant (mirrors `ToolRegistry::list_specs`).
pub fn render_tools(registry: &ToolRegistry) -> Vec<Value> {
    registry
        .list_specs()
        .iter()
        .map(tool_spec_to_llm_json)
        .collect()
}
