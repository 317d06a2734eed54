//! Tool gateway: the single path through which the agent runtime invokes a
//! tool. Grounded step-for-step in the original implementation's
//! `tools/gateway.py::ToolGateway.execute`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::redact::redact_json;

use super::policy::{Decision, ToolPolicy};
use super::registry::ToolRegistry;
use super::traits::{RiskLevel, ToolCall, ToolResult};

/// An append-only audit record. Logging failures are swallowed by the
/// gateway (they must never alter the returned [`ToolResult`]) but are
/// always surfaced at `warn` level so operators can see them in the logs,
/// per the open question in spec.md §9(c).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallLog {
    pub call_id: String,
    pub session_id: String,
    pub tool_name: String,
    pub args: Value,
    pub result: Option<Value>,
    pub ok: bool,
    pub elapsed_ms: u64,
    pub ts: DateTime<Utc>,
}

/// Where audit entries go. Implementations should not block the caller —
/// the gateway invokes this off the hot path via `tokio::spawn`.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: ToolCallLog) -> Result<(), String>;
}

/// An audit log that drops every entry. Used when no durable audit trail
/// is configured; still useful because the gateway's call-site never has
/// to special-case "no logging."
pub struct NullAuditLog;

#[async_trait]
impl AuditLog for NullAuditLog {
    async fn record(&self, _entry: ToolCallLog) -> Result<(), String> {
        Ok(())
    }
}

/// Gateway-level failure. Only these two variants interrupt the normal
/// "return a `ToolResult`" flow; everything else (deny, bad args, timeout,
/// handler error) is reported as an ordinary `ToolResult { ok: false, .. }`
/// so the LLM sees it as a tool observation rather than a crash.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("tool '{0}' is not registered")]
    NotRegistered(String),
    /// Raised with no side effects when a confirm-class tool is requested
    /// without `requires_confirm` having already been cleared by the
    /// agent runtime's confirmation flow.
    #[error("confirmation required for tool '{tool_name}': {reason}")]
    ConfirmationRequired { tool_name: String, reason: String },
}

pub struct ToolGateway {
    registry: Arc<ToolRegistry>,
    policy: ToolPolicy,
    audit_log: Arc<dyn AuditLog>,
}

impl ToolGateway {
    pub fn new(registry: Arc<ToolRegistry>, policy: ToolPolicy, audit_log: Arc<dyn AuditLog>) -> Self {
        Self {
            registry,
            policy,
            audit_log,
        }
    }

    pub fn with_null_audit_log(registry: Arc<ToolRegistry>, policy: ToolPolicy) -> Self {
        Self::new(registry, policy, Arc::new(NullAuditLog))
    }

    /// Execute `call` through lookup → policy → schema validation → timeout
    /// → audit log, exactly as spec.md §4.5 describes.
    pub async fn execute(&self, call: ToolCall) -> Result<ToolResult, GatewayError> {
        let spec = self
            .registry
            .get_spec(&call.tool_name)
            .map_err(|_| GatewayError::NotRegistered(call.tool_name.clone()))?;

        let decision = self.policy.evaluate(&spec.name, spec.risk);
        if decision.decision == Decision::Deny {
            let result = ToolResult::failure(call.call_id.clone(), decision.reason, 0);
            self.log(&call, &result);
            return Ok(result);
        }
        if decision.decision == Decision::Confirm && call.requires_confirm {
            return Err(GatewayError::ConfirmationRequired {
                tool_name: spec.name.clone(),
                reason: decision.reason,
            });
        }

        if let Err(validation_error) = validate_args(&spec.args_schema, &call.args) {
            let result = ToolResult::failure(call.call_id.clone(), validation_error, 0);
            self.log(&call, &result);
            return Ok(result);
        }

        let handler = match self.registry.handler(&spec.name) {
            Ok(handler) => handler,
            Err(err) => {
                let result = ToolResult::failure(call.call_id.clone(), err, 0);
                self.log(&call, &result);
                return Ok(result);
            }
        };

        let start = Instant::now();
        let timeout = std::time::Duration::from_millis(spec.timeout_ms);
        let outcome = tokio::time::timeout(timeout, handler.execute(call.args.clone())).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(value)) => ToolResult::success(call.call_id.clone(), Some(value), elapsed_ms),
            Ok(Err(err)) => ToolResult::failure(call.call_id.clone(), err, elapsed_ms),
            Err(_) => ToolResult::failure(call.call_id.clone(), "timeout", elapsed_ms),
        };

        self.log(&call, &result);
        Ok(result)
    }

    fn log(&self, call: &ToolCall, result: &ToolResult) {
        let entry = ToolCallLog {
            call_id: result.call_id.clone(),
            session_id: call.session_id.clone(),
            tool_name: call.tool_name.clone(),
            args: redact_json(&call.args),
            result: result.result.as_ref().map(redact_json),
            ok: result.ok,
            elapsed_ms: result.elapsed_ms,
            ts: Utc::now(),
        };
        let audit_log = Arc::clone(&self.audit_log);
        tokio::spawn(async move {
            if let Err(err) = audit_log.record(entry).await {
                tracing::warn!(error = %err, "tool call audit log write failed");
            }
        });
    }
}

fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| format!("invalid args schema: {e}"))?;
    compiled
        .validate(args)
        .map_err(|errors| {
            errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;
    use serde_json::json;

    struct EchoTool(super::super::traits::ToolSpec);

    #[at]
    impl super::super::traits::Tool for EchoTool {
        fn spec(&self) -> &super::super::traits::ToolSpec {
            &self.0
        }
        async fn execute(&self, args: Value) -> Result<Value, String> {
            Ok(args)
        }
    }

    fn registry_with(name: &str, risk: RiskLevel, schema: Value) -> Arc<ToolRegistry> {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(EchoTool(super::super::traits::ToolSpec {
            name: name.to_string(),
            description: "echo".to_string(),
            args_schema: schema,
            risk,
            timeout_ms: 1000,
            caps: vec![],
        })))
        .unwrap();
        Arc::new(reg)
    }

    fn call(tool: &str, args: Value, requires_confirm: bool) -> ToolCall {
        ToolCall {
            session_id: "s1".to_string(),
            call_id: "c1".to_string(),
            tool_name: tool.to_string(),
            args,
            requires_confirm,
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_not_registered() {
        let gw = ToolGateway::with_null_audit_log(Arc::new(ToolRegistry::new()), ToolPolicy::default());
        let err = gw.execute(call("nope", json!({}), false)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn safe_tool_executes_and_logs() {
        let reg = registry_with("echo", RiskLevel::Safe, json!({"type": "object"}));
        let gw = ToolGateway::with_null_audit_log(reg, ToolPolicy::default());
        let result = gw.execute(call("echo", json!({"x": 1}), false)).await.unwrap();
        assert!(result.ok);
        assert_eq!(result.result.unwrap()["data"]["x"], 1);
    }

    #[tokio::test]
    async fn confirm_tool_raises_without_side_effects() {
        let reg = registry_with("fs.write", RiskLevel::Confirm, json!({"type": "object"}));
        let gw = ToolGateway::with_null_audit_log(reg, ToolPolicy::default());
        let err = gw
            .execute(call("fs.write", json!({}), true))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ConfirmationRequired { .. }));
    }

    #[tokio::test]
    async fn confirm_tool_runs_once_confirmed() {
        let reg = registry_with("fs.write", RiskLevel::Confirm, json!({"type": "object"}));
        let gw = ToolGateway::with_null_audit_log(reg, ToolPolicy::default());
        let result = gw
            .execute(call("fs.write", json!({}), false))
            .await
            .unwrap();
        assert!(result.ok);
    }

    #[tokio::test]
    async fn dangerous_tool_denied_by_default() {
        let reg = registry_with("shell.exec", RiskLevel::Dangerous, json!({"type": "object"}));
        let gw = ToolGateway::with_null_audit_log(reg, ToolPolicy::default());
        let result = gw
            .execute(call("shell.exec", json!({}), true))
            .await
            .unwrap();
        assert!(!result.ok);
        assert_eq!(result.error.unwrap(), "Tool is dangerous by default");
    }

    #[tokio::test]
    async fn invalid_args_never_reach_the_handler() {
        let schema = json!({"type": "object", "required": ["query"], "properties": {"query": {"type": "string"}}});
        let reg = registry_with("echo", RiskLevel::Safe, schema);
        let gw = ToolGateway::with_null_audit_log(reg, ToolPolicy::default());
        let result = gw.execute(call("echo", json!({}), false)).await.unwrap();
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn satisfying_args_are_never_rejected() {
        let schema = json!({"type": "object", "required": ["query"], "properties": {"query": {"type": "string"}}});
        let reg = registry_with("echo", RiskLevel::Safe, schema);
        let gw = ToolGateway::with_null_audit_log(reg, ToolPolicy::default());
        let result = gw
            .execute(call("echo", json!({"query": "x"}), false))
            .await
            .unwrap();
        assert!(result.ok);
    }
}
