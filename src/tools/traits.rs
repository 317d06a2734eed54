use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Policy classification attached to every registered tool.
///
/// `safe` tools run without confirmation, `confirm` tools pause the turn
/// for a yes/no from the user, and `dangerous` tools are denied by default
/// (an operator must explicitly override via policy configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Confirm,
    Dangerous,
}

/// Immutable description of a tool, fixed at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique dotted identifier, e.g. `"fs.read"` or `"mcp.search.web_lookup"`.
    pub name: String,
    pub description: String,
    pub args_schema: Value,
    pub risk: RiskLevel,
    pub timeout_ms: u64,
    /// Free-form capability tags (e.g. `"filesystem"`, `"network"`), carried
    /// through for operator tooling; the gateway does not interpret them.
    #[serde(default)]
    pub caps: Vec<String>,
}

/// A capability exposed to the agent loop and invoked through the gateway.
///
/// Implementations must be `Send + Sync` so they can be held behind a
/// shared `Arc<dyn Tool>` in the registry. The gateway treats a tool as an
/// abstract async function of a JSON object to a JSON-serializable value —
/// it never inspects the concrete handler type.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Immutable spec this tool was registered with.
    fn spec(&self) -> &ToolSpec;

    /// Execute with already-schema-validated arguments. Returning `Err`
    /// becomes a failed gateway result with the error string as
    /// `result.error`; any blocking I/O must be offloaded to a worker
    /// thread by the implementation (e.g. `tokio::task::spawn_blocking`).
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// A transient request to invoke a tool, constructed by the agent runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub session_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub args: Value,
    pub requires_confirm: bool,
}

impl ToolCall {
    pub fn new_call_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// The outcome of invoking a tool through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub ok: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, data: Option<Value>, elapsed_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            ok: true,
            result: data.map(|d| serde_json::json!({ "data": d })),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            ok: false,
            result: None,
            error: Some(error.into()),
            elapsed_ms,
        }
    }
}
