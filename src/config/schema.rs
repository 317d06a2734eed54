//! TOML configuration schema for the runtime.
//!
//! All fields have `#[serde(default)]` so a partially-filled `config.toml`
//! works correctly. Missing sections fall back to their `Default` impl.
//! Trimmed to what this runtime actually uses — LLM provider settings,
//! scheduler tick interval, the MCP server list path, the filesystem
//! sandbox root, and the tool policy's confirm/deny lists. Desktop/
//! channel/Tauri-specific sections (identity, memory, notifications,
//! container sandboxing) are out of scope; see DESIGN.md.
//!
//! Example `~/.zenii/config.toml`:
//! ```toml
//! [provider]
//! base_url = "https://api.openai.com/v1"
//! default_model = "gpt-4o-mini"
//!
//! [scheduler]
//! interval_secs = 30
//!
//! [policy]
//! confirm_tools = ["web.search"]
//! deny_tools = []
//!
//! [workspace]
//! root = "/home/user/zenii-workspace"
//!
//! mcp_config_path = "/home/user/.zenii/mcp.json"
//! ```

use serde::{Deserialize, Serialize};

// ─── ProviderConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible base URL (e.g. a local model server or a hosted
    /// aggregator). `None` leaves the LLM unconfigured, in which case the
    /// agent runtime echoes input instead of calling an LLM.
    pub base_url: Option<String>,
    /// Default model identifier (e.g. `"gpt-4o-mini"`).
    pub default_model: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_model: "gpt-4o-mini".to_owned(),
            request_timeout_secs: 60,
        }
    }
}

// ─── SchedulerConfig ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick interval in seconds, per spec.md §4.9 (default 30).
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

// ─── PolicyConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Tool names that always require confirmation regardless of risk tier.
    pub confirm_tools: Vec<String>,
    /// Tool names that are always denied regardless of risk tier.
    pub deny_tools: Vec<String>,
}

// ─── WorkspaceConfig ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Root directory the filesystem sandbox confines file tools to.
    pub root: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: "./workspace".to_string(),
        }
    }
}

// ─── AppConfig ────────────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// Loaded from `~/.zenii/config.toml`, falling back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub scheduler: SchedulerConfig,
    pub policy: PolicyConfig,
    pub workspace: WorkspaceConfig,
    /// Path to the MCP server list document, per spec.md §6 "MCP config".
    /// `None` means no MCP servers are connected.
    pub mcp_config_path: Option<String>,
}
