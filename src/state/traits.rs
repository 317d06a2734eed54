use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three roles a persisted message can carry. System messages are
/// never persisted — the system prompt is re-assembled fresh on every LLM
/// call from the prompt files, per the agent runtime's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A single append-only message in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub role: Role,
    pub content: String,
    pub ts: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            role,
            content: content.into(),
            ts: Utc::now(),
        }
    }
}

/// Append-only, per-session message log.
///
/// Sessions are created lazily on first append and are never deleted.
/// Messages are strictly ordered by insertion — `ts` is informational only
/// and must never be used to reorder `list_messages` results. Concurrent
/// callers must observe each other's completed writes (no stale reads).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Append a message to `session_id`'s history and return the stored
    /// record (with its generated `message_id` and timestamp).
    async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, String>;

    /// List every message ever appended to `session_id`, in insertion order.
    /// A session with no messages yet returns an empty vector, not an error.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, String>;
}
