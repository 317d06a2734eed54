//! Stdio transport: one child process speaking newline-delimited JSON-RPC on
//! its stdin/stdout. Grounded directly in the teacher's `McpProcess`/`McpClient::call`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::client::McpTransport;
use super::types::{JsonRpcRequest, JsonRpcResponse, McpError};

pub struct StdioTransport {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

struct Inner {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::Transport(format!("failed to start '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("child has no stdin".to_string()))?;
        let stdout = BufReader::new(
            child
                .stdout
                .take()
                .ok_or_else(|| McpError::Transport("child has no stdout".to_string()))?,
        );

        Ok(Self {
            next_id: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                _child: child,
                stdin,
                stdout,
            }),
        })
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);
        let mut line =
            serde_json::to_string(&req).map_err(|e| McpError::Transport(e.to_string()))?;
        line.push('\n');

        let mut inner = self.inner.lock().await;
        inner
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("write failed: {e}")))?;
        inner
            .stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("flush failed: {e}")))?;

        let mut resp_line = String::new();
        inner
            .stdout
            .read_line(&mut resp_line)
            .await
            .map_err(|e| McpError::Transport(format!("read failed: {e}")))?;
        if resp_line.is_empty() {
            return Err(McpError::Transport(
                "MCP server closed the connection".to_string(),
            ));
        }

        let resp: JsonRpcResponse = serde_json::from_str(&resp_line)
            .map_err(|e| McpError::Transport(format!("bad response: {e}")))?;
        into_result(resp)
    }
}

pub(super) fn into_result(resp: JsonRpcResponse) -> Result<Value, McpError> {
    if let Some(err) = resp.error {
        return Err(McpError::ToolCallFailed(format!(
            "{} ({})",
            err.message, err.code
        )));
    }
    Ok(resp.result.unwrap_or(Value::Null))
}
