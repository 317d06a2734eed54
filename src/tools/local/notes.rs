//! An append-only note log, independent of conversation history.
//!
//! Grounded in `original_source/src/friday/tools/local/notes.py`'s
//! `NotesService.append`/`search` and `storage/repos/notes.py`'s
//! `add_note`/`search_notes` (a plain substring `LIKE` scan). `notes.append`
//! and `notes.search` share one `NoteStore` so a note written in one call is
//! findable in the next, the way the Python tools share one SQLite table.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, RwLock};

use crate::tools::traits::{RiskLevel, Tool, ToolSpec};

/// The note log shared between [`NotesAppendTool`] and [`NotesSearchTool`].
pub type NoteStore = Arc<RwLock<Vec<String>>>;

pub struct NotesAppendTool {
    spec: ToolSpec,
    notes: NoteStore,
}

impl NotesAppendTool {
    pub fn new() -> Self {
        Self::with_store(Arc::new(RwLock::new(Vec::new())))
    }

    pub fn with_store(notes: NoteStore) -> Self {
        Self {
            spec: ToolSpec {
                name: "notes.append".to_string(),
                description: "Append a line to the persistent note log.".to_string(),
                args_schema: json!({
                    "type": "object",
                    "required": ["text"],
                    "properties": {"text": {"type": "string"}}
                }),
                risk: RiskLevel::Safe,
                timeout_ms: 2000,
                caps: vec![],
            },
            notes,
        }
    }

    pub fn store(&self) -> NoteStore {
        Arc::clone(&self.notes)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.notes.read().map(|n| n.clone()).unwrap_or_default()
    }
}

impl Default for NotesAppendTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for NotesAppendTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'text'".to_string())?;
        let mut notes = self
            .notes
            .write()
            .map_err(|e| format!("notes log lock poisoned: {e}"))?;
        notes.push(text.to_string());
        Ok(json!({ "count": notes.len() }))
    }
}

/// `notes.search`: a case-insensitive substring scan over the note log,
/// mirroring `search_notes`'s `WHERE content LIKE '%query%'`.
pub struct NotesSearchTool {
    spec: ToolSpec,
    notes: NoteStore,
}

impl NotesSearchTool {
    pub fn new(notes: NoteStore) -> Self {
        Self {
            spec: ToolSpec {
                name: "notes.search".to_string(),
                description: "Search the note log for lines containing `query` \
                    (case-insensitive substring match)."
                    .to_string(),
                args_schema: json!({
                    "type": "object",
                    "required": ["query"],
                    "properties": {
                        "query": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1}
                    }
                }),
                risk: RiskLevel::Safe,
                timeout_ms: 2000,
                caps: vec![],
            },
            notes,
        }
    }
}

#[async_trait]
impl Tool for NotesSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'query'".to_string())?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(20)
            .max(1) as usize;

        let needle = query.to_lowercase();
        let notes = self
            .notes
            .read()
            .map_err(|e| format!("notes log lock poisoned: {e}"))?;
        let matches: Vec<&String> = notes
            .iter()
            .filter(|n| n.to_lowercase().contains(&needle))
            .take(limit)
            .collect();
        Ok(json!({ "matches": matches }))
    }
}
