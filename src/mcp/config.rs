//! MCP server configuration, grounded in
//! `original_source/src/friday/mcp/config.py`'s `MCPServerConfig`/`load_mcp_config`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::tools::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Sse,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: TransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub trusted: bool,
    #[serde(default)]
    pub allow_tools: Vec<String>,
    /// Per-tool risk overrides, keyed by server-local (undotted) tool name.
    /// A tool with no entry here defaults to [`RiskLevel::Safe`].
    #[serde(default)]
    pub risk_overrides: HashMap<String, RiskLevel>,
}

impl McpServerConfig {
    /// Whether `tool_name` (server-local, undotted) is permitted to register.
    /// Untrusted servers without an explicit allow-list register nothing.
    pub fn allows(&self, tool_name: &str) -> bool {
        if !self.allow_tools.is_empty() {
            return self.allow_tools.iter().any(|t| t == tool_name);
        }
        self.trusted
    }

    /// Resolve the risk a newly-discovered tool should register with:
    /// `risk_overrides.get(tool_name)`, defaulting to `Safe`.
    pub fn resolve_risk(&self, tool_name: &str) -> RiskLevel {
        self.risk_overrides
            .get(tool_name)
            .copied()
            .unwrap_or(RiskLevel::Safe)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// Load server definitions from a JSON file. A missing file is an empty
/// configuration, not an error — MCP is entirely optional.
pub fn load_mcp_config(path: &Path) -> Result<McpConfig, String> {
    if !path.exists() {
        return Ok(McpConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| format!("reading {path:?}: {e}"))?;
    serde_json::from_str(&raw).map_err(|e| format!("parsing {path:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_empty_config() {
        let config = load_mcp_config(Path::new("/nonexistent/mcp.json")).unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn trusted_server_with_no_allow_list_allows_everything() {
        let server = McpServerConfig {
            name: "s".to_string(),
            transport: TransportKind::Stdio,
            command: None,
            args: vec![],
            env: HashMap::new(),
            cwd: None,
            url: None,
            headers: HashMap::new(),
            trusted: true,
            allow_tools: vec![],
            risk_overrides: HashMap::new(),
        };
        assert!(server.allows("anything"));
    }

    #[test]
    fn allow_list_restricts_untrusted_server() {
        let server = McpServerConfig {
            name: "s".to_string(),
            transport: TransportKind::Stdio,
            command: None,
            args: vec![],
            env: HashMap::new(),
            cwd: None,
            url: None,
            headers: HashMap::new(),
            trusted: false,
            allow_tools: vec!["ok_tool".to_string()],
            risk_overrides: HashMap::new(),
        };
        assert!(server.allows("ok_tool"));
        assert!(!server.allows("other_tool"));
    }

    #[test]
    fn resolve_risk_defaults_to_safe_absent_override() {
        let mut server = McpServerConfig {
            name: "s".to_string(),
            transport: TransportKind::Stdio,
            command: None,
            args: vec![],
            env: HashMap::new(),
            cwd: None,
            url: None,
            headers: HashMap::new(),
            trusted: true,
            allow_tools: vec![],
            risk_overrides: HashMap::new(),
        };
        assert_eq!(server.resolve_risk("anything"), RiskLevel::Safe);

        server
            .risk_overrides
            .insert("dangerous_tool".to_string(), RiskLevel::Dangerous);
        assert_eq!(server.resolve_risk("dangerous_tool"), RiskLevel::Dangerous);
        assert_eq!(server.resolve_risk("other_tool"), RiskLevel::Safe);
    }
}
