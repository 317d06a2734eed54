//! Task storage: in-memory (tests) and SQLite-backed (durable) repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// A background job the scheduler fires when due, per spec.md §3 `Task`.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub session_id: String,
    /// Either `"RRULE:…"` or an ISO-8601 one-shot datetime.
    pub schedule: String,
    pub payload: Option<Value>,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

impl Task {
    /// `payload.message`, falling back to `title`, per spec.md §4.9 step 2.
    pub fn message_text(&self) -> String {
        self.payload
            .as_ref()
            .and_then(|p| p.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.title.clone())
    }
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert `task`, assigning an id if `task.id` is empty.
    async fn add_task(&self, task: Task) -> Result<Task, String>;

    /// Every enabled task whose `next_run` is at or before `now`.
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, String>;

    /// Record that a task fired at `last_run`, recomputing `next_run`.
    /// `next_run = None` disables the task, per spec.md §4.9 step 3.
    async fn record_fire(
        &self,
        id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), String>;

    async fn list_tasks(&self) -> Result<Vec<Task>, String>;
}

#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn add_task(&self, mut task: Task) -> Result<Task, String> {
        if task.id.is_empty() {
            task.id = format!("task_{}", uuid::Uuid::new_v4().simple());
        }
        let mut tasks = self.tasks.write().map_err(|e| format!("lock: {e}"))?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, String> {
        let tasks = self.tasks.read().map_err(|e| format!("lock: {e}"))?;
        let mut due: Vec<Task> = tasks
            .values()
            .filter(|t| t.enabled && t.next_run.is_some_and(|next| next <= now))
            .cloned()
            .collect();
        due.sort_by_key(|t| t.id.clone());
        Ok(due)
    }

    async fn record_fire(
        &self,
        id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), String> {
        let mut tasks = self.tasks.write().map_err(|e| format!("lock: {e}"))?;
        let task = tasks.get_mut(id).ok_or_else(|| format!("task '{id}' not found"))?;
        task.last_run = Some(last_run);
        task.next_run = next_run;
        if next_run.is_none() {
            task.enabled = false;
        }
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, String> {
        let tasks = self.tasks.read().map_err(|e| format!("lock: {e}"))?;
        Ok(tasks.values().cloned().collect())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    session_id TEXT NOT NULL,
    schedule TEXT NOT NULL,
    payload TEXT,
    enabled INTEGER NOT NULL,
    last_run TEXT,
    next_run TEXT
);
"#;

/// SQLite-backed [`TaskRepository`]. Schema created in-code on open, no
/// migration framework, same pattern as `state::SqliteStateStore`.
pub struct SqliteTaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskRepository {
    pub fn open(path: &str) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| format!("SQLite open error: {e}"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| format!("SQLite schema error: {e}"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| format!("SQLite in-memory error: {e}"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| format!("SQLite schema error: {e}"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, String> {
        self.conn.lock().map_err(|e| format!("SQLite lock error: {e}"))
    }
}

fn row_to_task(
    id: String,
    title: String,
    session_id: String,
    schedule: String,
    payload: Option<String>,
    enabled: i64,
    last_run: Option<String>,
    next_run: Option<String>,
) -> Result<Task, String> {
    let payload = payload
        .map(|p| serde_json::from_str(&p))
        .transpose()
        .map_err(|e| format!("stored payload is corrupt: {e}"))?;
    let last_run = last_run
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| format!("stored last_run is corrupt: {e}"))?;
    let next_run = next_run
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| format!("stored next_run is corrupt: {e}"))?;
    Ok(Task {
        id,
        title,
        session_id,
        schedule,
        payload,
        enabled: enabled != 0,
        last_run,
        next_run,
    })
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn add_task(&self, mut task: Task) -> Result<Task, String> {
        if task.id.is_empty() {
            task.id = format!("task_{}", uuid::Uuid::new_v4().simple());
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (id, title, session_id, schedule, payload, enabled, last_run, next_run) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.id,
                task.title,
                task.session_id,
                task.schedule,
                task.payload.as_ref().map(|p| p.to_string()),
                task.enabled as i64,
                task.last_run.map(|t| t.to_rfc3339()),
                task.next_run.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| format!("SQLite insert error: {e}"))?;
        Ok(task)
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, String> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, session_id, schedule, payload, enabled, last_run, next_run \
                 FROM tasks WHERE enabled = 1 AND next_run IS NOT NULL AND next_run <= ?1 ORDER BY id ASC",
            )
            .map_err(|e| format!("SQLite prepare error: {e}"))?;
        let rows = stmt
            .query_map(params![now.to_rfc3339()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(|e| format!("SQLite query error: {e}"))?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, title, session_id, schedule, payload, enabled, last_run, next_run) =
                row.map_err(|e| format!("SQLite row error: {e}"))?;
            tasks.push(row_to_task(
                id, title, session_id, schedule, payload, enabled, last_run, next_run,
            )?);
        }
        Ok(tasks)
    }

    async fn record_fire(
        &self,
        id: &str,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<(), String> {
        let conn = self.lock()?;
        let enabled = next_run.is_some();
        let updated = conn
            .execute(
                "UPDATE tasks SET last_run = ?1, next_run = ?2, enabled = ?3 WHERE id = ?4",
                params![
                    last_run.to_rfc3339(),
                    next_run.map(|t| t.to_rfc3339()),
                    enabled as i64,
                    id,
                ],
            )
            .map_err(|e| format!("SQLite update error: {e}"))?;
        if updated == 0 {
            return Err(format!("task '{id}' not found"));
        }
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, String> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, title, session_id, schedule, payload, enabled, last_run, next_run FROM tasks")
            .map_err(|e| format!("SQLite prepare error: {e}"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })
            .map_err(|e| format!("SQLite query error: {e}"))?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, title, session_id, schedule, payload, enabled, last_run, next_run) =
                row.map_err(|e| format!("SQLite row error: {e}"))?;
            tasks.push(row_to_task(
                id, title, session_id, schedule, payload, enabled, last_run, next_run,
            )?);
        }
        Ok(tasks)
    }
}
