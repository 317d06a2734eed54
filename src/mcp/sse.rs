//! SSE transport.
//!
//! Simplified relative to the full MCP SSE transport (see DESIGN.md): we open
//! one GET stream that the server uses to push an `endpoint` event (the URL
//! to POST requests to) followed by `message` events carrying JSON-RPC
//! responses, and correlate each response to its request by `id` through a
//! one-shot channel. No reconnect/resume support.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};

use super::client::McpTransport;
use super::stdio::into_result;
use super::types::{JsonRpcRequest, JsonRpcResponse, McpError};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

pub struct SseTransport {
    http: Client,
    post_url: String,
    next_id: AtomicU64,
    pending: Pending,
}

impl SseTransport {
    pub async fn connect(
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        let http = Client::new();
        let mut req = http.get(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| McpError::Transport(format!("sse connect failed: {e}")))?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let byte_stream = resp.bytes_stream();
        let mut event_stream = eventsource_stream::Eventsource::eventsource(byte_stream);

        let (endpoint_tx, endpoint_rx) = oneshot::channel::<String>();
        let pending_for_task = Arc::clone(&pending);
        let base_url = base_origin(url);

        tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            while let Some(event) = event_stream.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(_) => break,
                };
                match event.event.as_str() {
                    "endpoint" => {
                        if let Some(tx) = endpoint_tx.take() {
                            let full = resolve_endpoint(&base_url, event.data.trim());
                            let _ = tx.send(full);
                        }
                    }
                    "message" | "" => {
                        if let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(&event.data) {
                            if let Some(id) = resp.id {
                                let mut guard = pending_for_task.lock().await;
                                if let Some(sender) = guard.remove(&id) {
                                    let _ = sender.send(resp);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        });

        let post_url = endpoint_rx
            .await
            .map_err(|_| McpError::Transport("sse server never sent an endpoint event".to_string()))?;

        Ok(Self {
            http,
            post_url,
            next_id: AtomicU64::new(0),
            pending,
        })
    }
}

fn base_origin(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => format!(
            "{}://{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default()
        ),
        Err(_) => String::new(),
    }
}

fn resolve_endpoint(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{base}{path}")
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let send_result = self.http.post(&self.post_url).json(&req).send().await;
        if let Err(e) = send_result {
            self.pending.lock().await.remove(&id);
            return Err(McpError::Transport(format!("post failed: {e}")));
        }

        let resp = rx
            .await
            .map_err(|_| McpError::Transport("sse response channel closed".to_string()))?;
        into_result(resp)
    }
}
