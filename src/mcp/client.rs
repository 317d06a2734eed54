//! Ties a transport to a server definition: handshake, tool discovery,
//! registration into the shared [`crate::tools::ToolRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::{Tool, ToolRegistry, ToolSpec};

use super::config::{McpConfig, McpServerConfig, TransportKind};
use super::http::HttpTransport;
use super::sse::SseTransport;
use super::stdio::StdioTransport;
use super::types::{McpError, McpToolDescriptor};

/// A single JSON-RPC round trip over whichever wire the server speaks.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError>;
}

async fn connect(server: &McpServerConfig) -> Result<Arc<dyn McpTransport>, McpError> {
    match server.transport {
        TransportKind::Stdio => {
            let command = server
                .command
                .as_deref()
                .ok_or_else(|| McpError::Transport("stdio server requires command".to_string()))?;
            let t = StdioTransport::spawn(command, &server.args, &server.env, server.cwd.as_deref())
                .await?;
            Ok(Arc::new(t))
        }
        TransportKind::Sse => {
            let url = server
                .url
                .as_deref()
                .ok_or_else(|| McpError::Transport("sse server requires url".to_string()))?;
            let t = SseTransport::connect(url, &server.headers).await?;
            Ok(Arc::new(t))
        }
        TransportKind::Http => {
            let url = server
                .url
                .as_deref()
                .ok_or_else(|| McpError::Transport("http server requires url".to_string()))?;
            Ok(Arc::new(HttpTransport::new(url, &server.headers)))
        }
    }
}

async fn handshake(transport: &dyn McpTransport) -> Result<Vec<McpToolDescriptor>, McpError> {
    transport
        .call(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "zenii-runtime", "version": env!("CARGO_PKG_VERSION")}
            }),
        )
        .await
        .map_err(|e| McpError::HandshakeFailed(e.to_string()))?;

    let result = transport.call("tools/list", Value::Null).await?;
    let tools: Vec<McpToolDescriptor> = result
        .get("tools")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    Ok(tools)
}

/// A registered MCP tool, delegating execution back to its server over
/// whichever transport it was discovered on.
struct McpToolProxy {
    spec: ToolSpec,
    server_tool_name: String,
    transport: Arc<dyn McpTransport>,
}

#[async_trait]
impl Tool for McpToolProxy {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let result = self
            .transport
            .call(
                "tools/call",
                json!({"name": self.server_tool_name, "arguments": args}),
            )
            .await
            .map_err(|e| e.to_string())?;

        if result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let message = result
                .get("content")
                .and_then(Value::as_array)
                .and_then(|arr| arr.first())
                .and_then(|item| item.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("MCP tool returned an error");
            return Err(message.to_string());
        }
        Ok(result)
    }
}

/// Connects to every configured MCP server and registers its allowed tools.
/// A server that fails to connect is logged and skipped — one broken MCP
/// server must not prevent the rest from working.
pub struct McpClient {
    servers: Vec<(String, Arc<dyn McpTransport>)>,
}

impl McpClient {
    pub async fn connect_all(config: &McpConfig, registry: &mut ToolRegistry) -> Self {
        let mut servers = Vec::new();

        for server in &config.servers {
            let transport = match connect(server).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(server = %server.name, error = %e, "failed to connect MCP server");
                    continue;
                }
            };

            let tools = match handshake(transport.as_ref()).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(server = %server.name, error = %e, "MCP handshake failed");
                    continue;
                }
            };

            for tool in tools {
                if !server.allows(&tool.name) {
                    continue;
                }
                let full_name = format!("mcp.{}.{}", server.name, tool.name);
                let proxy = McpToolProxy {
                    spec: ToolSpec {
                        name: full_name.clone(),
                        description: tool.description,
                        args_schema: tool.input_schema,
                        risk: server.resolve_risk(&tool.name),
                        timeout_ms: 15_000,
                        caps: vec!["mcp".to_string()],
                    },
                    server_tool_name: tool.name,
                    transport: Arc::clone(&transport),
                };
                if let Err(e) = registry.register(Arc::new(proxy)) {
                    tracing::warn!(tool = %full_name, error = %e, "failed to register MCP tool");
                }
            }

            servers.push((server.name.clone(), transport));
        }

        Self { servers }
    }

    pub fn connected_servers(&self) -> Vec<&str> {
        self.servers.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn connect_all_skips_servers_with_no_command() {
        let config = McpConfig {
            servers: vec![McpServerConfig {
                name: "broken".to_string(),
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
            }],
        };
        let mut registry = ToolRegistry::new();
        let client = McpClient::connect_all(&config, &mut registry).await;
        assert!(client.connected_servers().is_empty());
    }

    #[tokio::test]
    async fn empty_config_connects_nothing() {
        let mut registry = ToolRegistry::new();
        let client = McpClient::connect_all(&McpConfig::default(), &mut registry).await;
        assert!(client.connected_servers().is_empty());
    }
}
