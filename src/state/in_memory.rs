use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{Message, Role, StateStore};

/// In-memory [`StateStore`], used for tests and for any deployment that
/// does not need history to survive a restart.
#[derive(Default)]
pub struct InMemoryStateStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, String> {
        let message = Message::new(role, content);
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| format!("state store lock poisoned: {e}"))?;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, String> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| format!("state store lock poisoned: {e}"))?;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }
}
