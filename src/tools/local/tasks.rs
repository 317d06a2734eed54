//! `tasks.create`: the one LLM-callable entry point into the scheduler.
//!
//! Grounded in `original_source/src/friday/tools/local/tasks.py`'s
//! `TasksService.create` — compute the first occurrence with
//! `next_run_ts`/here `initial_next_run`, reject a schedule with no future
//! run, then persist through the same repository the scheduler itself
//! polls. `tasks.search`/`tasks.run` are not carried over: spec.md's
//! `Task` has no notion of a one-off "run now" action and the scheduler's
//! own `due_tasks` query already is the search surface an operator needs.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::scheduler::{Task, TaskRepository, initial_next_run};
use crate::tools::traits::{RiskLevel, Tool, ToolSpec};

pub struct TaskCreateTool {
    spec: ToolSpec,
    repo: Arc<dyn TaskRepository>,
}

impl TaskCreateTool {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self {
            spec: ToolSpec {
                name: "tasks.create".to_string(),
                description: "Schedule a reminder or recurring task. `schedule` is either \
                    an `RRULE:...` recurrence rule or an ISO-8601 one-shot datetime; \
                    `session_id` is whichever session should be notified when it fires."
                    .to_string(),
                args_schema: json!({
                    "type": "object",
                    "required": ["session_id", "title", "schedule"],
                    "properties": {
                        "session_id": {"type": "string"},
                        "title": {"type": "string"},
                        "schedule": {"type": "string"},
                        "payload": {"type": "object"}
                    }
                }),
                risk: RiskLevel::Confirm,
                timeout_ms: 2000,
                caps: vec!["tasks".to_string()],
            },
            repo,
        }
    }
}

#[async_trait]
impl Tool for TaskCreateTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let session_id = args
            .get("session_id")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'session_id'".to_string())?;
        let title = args
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'title'".to_string())?;
        let schedule = args
            .get("schedule")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'schedule'".to_string())?;
        let payload = args.get("payload").cloned();

        let next_run = initial_next_run(schedule, Utc::now()).map_err(|e| e.to_string())?;
        let next_run = next_run.ok_or_else(|| "schedule does not produce a future run".to_string())?;

        let task = Task {
            id: String::new(),
            title: title.to_string(),
            session_id: session_id.to_string(),
            schedule: schedule.to_string(),
            payload,
            enabled: true,
            last_run: None,
            next_run: Some(next_run),
        };
        let created = self.repo.add_task(task).await?;
        Ok(json!({ "task_id": created.id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InMemoryTaskRepository;

    fn tool() -> TaskCreateTool {
        TaskCreateTool::new(Arc::new(InMemoryTaskRepository::new()))
    }

    #[tokio::test]
    async fn creates_a_one_shot_task_with_computed_next_run() {
        let tool = tool();
        let result = tool
            .execute(json!({
                "session_id": "s1",
                "title": "water plants",
                "schedule": "2999-01-01T00:00:00Z"
            }))
            .await
            .unwrap();
        assert!(result["task_id"].as_str().unwrap().starts_with("task_"));
    }

    #[tokio::test]
    async fn rejects_a_schedule_with_no_future_run() {
        let tool = tool();
        let err = tool
            .execute(json!({
                "session_id": "s1",
                "title": "too late",
                "schedule": "2000-01-01T00:00:00Z"
            }))
            .await
            .unwrap_err();
        assert!(err.contains("future run"));
    }

    #[tokio::test]
    async fn missing_session_id_is_rejected() {
        let tool = tool();
        let err = tool
            .execute(json!({"title": "x", "schedule": "2999-01-01T00:00:00Z"}))
            .await
            .unwrap_err();
        assert!(err.contains("session_id"));
    }
}
