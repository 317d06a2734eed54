//! Bus payload shapes for the `input.text`/`input.text.partial`/`output.text`
//! topics, per spec.md §6.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Ui,
    Cli,
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputText {
    pub session_id: String,
    pub message_id: String,
    pub ts: DateTime<Utc>,
    pub text: String,
    pub source: InputSource,
}

/// Informational only — the core never consumes this topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputTextPartial {
    pub session_id: String,
    pub message_id: String,
    pub ts: DateTime<Utc>,
    pub text: String,
    pub source: InputSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputText {
    pub session_id: String,
    pub message_id: String,
    pub ts: DateTime<Utc>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
}

impl OutputText {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            ts: Utc::now(),
            text: text.into(),
            thinking: None,
        }
    }
}
