//! A single generic web search tool — not the provider zoo spec.md excludes.
//!
//! Grounded in `original_source/src/friday/tools/local/web_search.py`: one
//! tool name (`web.search`), one pluggable backend trait. Concrete search
//! providers (Bing, SerpAPI, etc.) are wiring concerns left to whoever
//! constructs a [`WebSearchTool`], not something this crate builds out.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::tools::traits::{RiskLevel, Tool, ToolSpec};

/// A pluggable search backend. `search` returns whatever JSON-serializable
/// value the backend produces (typically a list of `{title, url, snippet}`
/// objects).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Value, String>;
}

pub struct WebSearchTool {
    spec: ToolSpec,
    provider: Option<Arc<dyn SearchProvider>>,
}

impl WebSearchTool {
    pub fn new(provider: Option<Arc<dyn SearchProvider>>) -> Self {
        Self {
            spec: ToolSpec {
                name: "web.search".to_string(),
                description: "Search the web and return a list of results.".to_string(),
                args_schema: json!({
                    "type": "object",
                    "required": ["query"],
                    "properties": {"query": {"type": "string"}}
                }),
                risk: RiskLevel::Safe,
                timeout_ms: 10_000,
                caps: vec!["network".to_string()],
            },
            provider,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'query'".to_string())?;
        match &self.provider {
            Some(provider) => provider.search(query).await,
            None => Err("no search provider configured".to_string()),
        }
    }
}
