//! SQLite-backed [`StateStore`].
//!
//! Mirrors the teacher's `memory::sqlite_store::SqliteMemoryStore`: schema
//! is created in-code on open (no migration framework — concrete SQL
//! schemas/migrations are out of scope for this crate), the connection is
//! wrapped in `Arc<Mutex<..>>` to stay `Send + Sync` under SQLite's
//! single-writer model, and WAL mode is enabled for concurrent readers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use std::sync::{Arc, Mutex};

use super::traits::{Message, Role, StateStore};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS session_messages (
    message_id TEXT PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    ts TEXT NOT NULL,
    seq INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_messages_session ON session_messages (session_id, seq);
"#;

pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    /// Open (or create) a SQLite database at `path` and initialise the schema.
    pub fn open(path: &str) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| format!("SQLite open error: {e}"))?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))
            .map_err(|e| format!("SQLite PRAGMA error: {e}"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| format!("SQLite schema error: {e}"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory SQLite store — useful for integration tests that want the
    /// durable code path without a file on disk.
    pub fn in_memory() -> Result<Self, String> {
        let conn =
            Connection::open_in_memory().map_err(|e| format!("SQLite in-memory error: {e}"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| format!("SQLite schema error: {e}"))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|e| format!("SQLite lock error: {e}"))
    }
}

fn role_to_str(role: Role) -> &'static str {
    role.as_str()
}

fn str_to_role(s: &str) -> Result<Role, String> {
    match s {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "tool" => Ok(Role::Tool),
        other => Err(format!("unknown persisted role: {other}")),
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, String> {
        let message = Message::new(role, content);
        let conn = self.lock()?;
        let seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM session_messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|e| format!("SQLite select error: {e}"))?;
        conn.execute(
            "INSERT INTO session_messages (message_id, session_id, role, content, ts, seq) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.message_id,
                session_id,
                role_to_str(role),
                message.content,
                message.ts.to_rfc3339(),
                seq,
            ],
        )
        .map_err(|e| format!("SQLite insert error: {e}"))?;
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, String> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT message_id, role, content, ts FROM session_messages \
                 WHERE session_id = ?1 ORDER BY seq ASC",
            )
            .map_err(|e| format!("SQLite prepare error: {e}"))?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                let message_id: String = row.get(0)?;
                let role_str: String = row.get(1)?;
                let content: String = row.get(2)?;
                let ts_str: String = row.get(3)?;
                Ok((message_id, role_str, content, ts_str))
            })
            .map_err(|e| format!("SQLite query error: {e}"))?;

        let mut messages = Vec::new();
        for row in rows {
            let (message_id, role_str, content, ts_str) =
                row.map_err(|e| format!("SQLite row error: {e}"))?;
            let role = str_to_role(&role_str)?;
            let ts: DateTime<Utc> = ts_str
                .parse()
                .map_err(|e| format!("stored timestamp is corrupt: {e}"))?;
            messages.push(Message {
                message_id,
                role,
                content,
                ts,
            });
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_messages_in_order() {
        let store = SqliteStateStore::in_memory().unwrap();
        store.add_message("s1", Role::User, "hi").await.unwrap();
        store
            .add_message("s1", Role::Assistant, "hello")
            .await
            .unwrap();
        let messages = store.list_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn persists_across_stores_sharing_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite3");
        let path_str = path.to_str().unwrap().to_string();
        {
            let store = SqliteStateStore::open(&path_str).unwrap();
            store.add_message("s1", Role::User, "hi").await.unwrap();
        }
        let reopened = SqliteStateStore::open(&path_str).unwrap();
        assert_eq!(reopened.list_messages("s1").await.unwrap().len(), 1);
    }
}
