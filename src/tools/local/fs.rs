//! Workspace-sandboxed filesystem tools.
//!
//! The path-containment check is grounded in the teacher's
//! `security::policy::SecurityPolicy::validate_path`: reject null bytes and
//! literal `..` components up front, canonicalize what exists, and require
//! the canonicalized path to fall under the workspace root. This is the
//! concrete implementation of spec.md §6's filesystem sandbox requirement.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

use crate::tools::traits::{RiskLevel, Tool, ToolSpec};

/// Resolve `user_path` against `workspace_root`, rejecting any path that
/// escapes it. No I/O is performed when the path is rejected.
pub fn confine_to_workspace(workspace_root: &Path, user_path: &str) -> Result<PathBuf, String> {
    if user_path.contains('\0') {
        return Err("path contains a null byte".to_string());
    }
    if Path::new(user_path)
        .components()
        .any(|c| c == std::path::Component::ParentDir)
    {
        return Err("path escapes workspace root".to_string());
    }

    let candidate = workspace_root.join(user_path);
    let root_canonical = workspace_root
        .canonicalize()
        .map_err(|e| format!("workspace root is invalid: {e}"))?;

    // The candidate may not exist yet (e.g. a write target); fall back to
    // the joined, non-canonicalized path for the containment check in that
    // case, the same way the teacher's `validate_path` does.
    let candidate_canonical = candidate.canonicalize().unwrap_or(candidate);

    if !candidate_canonical.starts_with(&root_canonical) {
        return Err("path escapes workspace root".to_string());
    }

    Ok(candidate_canonical)
}

pub struct FsReadTool {
    spec: ToolSpec,
    workspace_root: PathBuf,
}

impl FsReadTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            spec: ToolSpec {
                name: "fs.read".to_string(),
                description: "Read a UTF-8 text file under the workspace root.".to_string(),
                args_schema: json!({
                    "type": "object",
                    "required": ["path"],
                    "properties": {"path": {"type": "string"}}
                }),
                risk: RiskLevel::Safe,
                timeout_ms: 2000,
                caps: vec!["filesystem".to_string()],
            },
            workspace_root,
        }
    }
}

#[async_trait]
impl Tool for FsReadTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'path'".to_string())?;
        let resolved = confine_to_workspace(&self.workspace_root, path)?;
        let content = tokio::task::spawn_blocking(move || std::fs::read_to_string(&resolved))
            .await
            .map_err(|e| format!("fs.read task panicked: {e}"))?
            .map_err(|e| format!("fs.read failed: {e}"))?;
        Ok(json!({ "content": content }))
    }
}

pub struct FsWriteTool {
    spec: ToolSpec,
    workspace_root: PathBuf,
}

impl FsWriteTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self {
            spec: ToolSpec {
                name: "fs.write".to_string(),
                description: "Write (or overwrite) a UTF-8 text file under the workspace root."
                    .to_string(),
                args_schema: json!({
                    "type": "object",
                    "required": ["path", "content"],
                    "properties": {
                        "path": {"type": "string"},
                        "content": {"type": "string"}
                    }
                }),
                risk: RiskLevel::Confirm,
                timeout_ms: 2000,
                caps: vec!["filesystem".to_string()],
            },
            workspace_root,
        }
    }
}

#[async_trait]
impl Tool for FsWriteTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let path = args
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'path'".to_string())?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'content'".to_string())?
            .to_string();
        let resolved = confine_to_workspace(&self.workspace_root, path)?;
        tokio::task::spawn_blocking(move || -> Result<(), String> {
            if let Some(parent) = resolved.parent() {
                std::fs::create_dir_all(parent).map_err(|e| format!("fs.write failed: {e}"))?;
            }
            std::fs::write(&resolved, content).map_err(|e| format!("fs.write failed: {e}"))
        })
        .await
        .map_err(|e| format!("fs.write task panicked: {e}"))??;
        Ok(json!({ "written": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_escape_is_rejected_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let err = confine_to_workspace(dir.path(), "../secret.txt").unwrap_err();
        assert!(err.contains("escapes workspace"));
    }

    #[test]
    fn null_byte_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = confine_to_workspace(dir.path(), "ok\0.txt").unwrap_err();
        assert!(err.contains("null byte"));
    }

    #[tokio::test]
    async fn write_then_read_round_trips_inside_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let write = FsWriteTool::new(dir.path().to_path_buf());
        write
            .execute(json!({"path": "notes/a.txt", "content": "hello"}))
            .await
            .unwrap();

        let read = FsReadTool::new(dir.path().to_path_buf());
        let result = read.execute(json!({"path": "notes/a.txt"})).await.unwrap();
        assert_eq!(result["content"], "hello");
    }

    #[tokio::test]
    async fn read_rejects_escaping_path_and_does_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let read = FsReadTool::new(dir.path().to_path_buf());
        let err = read
            .execute(json!({"path": "../secret.txt"}))
            .await
            .unwrap_err();
        assert!(err.contains("escapes workspace"));
    }
}
