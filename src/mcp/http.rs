//! Streamable-HTTP transport, simplified to one POST per call (see
//! DESIGN.md — full streamable HTTP supports an upgrade to a server-sent
//! event stream for server-initiated messages, which this crate doesn't
//! need since it never receives unsolicited MCP notifications).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::client::McpTransport;
use super::stdio::into_result;
use super::types::{JsonRpcRequest, JsonRpcResponse, McpError};

pub struct HttpTransport {
    http: Client,
    url: String,
    headers: HashMap<String, String>,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: &str, headers: &HashMap<String, String>) -> Self {
        Self {
            http: Client::new(),
            url: url.to_string(),
            headers: headers.clone(),
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let mut builder = self.http.post(&self.url).json(&req);
        for (k, v) in &self.headers {
            builder = builder.header(k, v);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| McpError::Transport(format!("post failed: {e}")))?;
        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| McpError::Transport(format!("bad response: {e}")))?;
        into_result(body)
    }
}
