//! Loads the system prompt once at startup, per spec.md §4.8 step 3.
//!
//! Looks for `~/.zenii/prompts/system.md` and `~/.zenii/prompts/tools.md`;
//! either or both may be absent, in which case a built-in default is used
//! for the missing piece. No templating, no per-request rendering — the
//! assembled string is loaded once and reused for every turn.

use std::path::PathBuf;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful local assistant. Be concise and direct.";

pub const DEFAULT_TOOL_INSTRUCTIONS: &str = "When a tool call would help answer the request, call it. \
Wait for the tool's result before continuing. If a tool requires confirmation, the user will be asked \
and you will see the outcome as a subsequent message.";

/// Return `~/.zenii/prompts`, without creating it.
fn prompts_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".zenii").join("prompts"))
}

/// Read `name` from the prompts directory, falling back to `default` if the
/// directory or file doesn't exist or can't be read.
fn read_or_default(name: &str, default: &str) -> String {
    let Some(dir) = prompts_dir() else {
        return default.to_string();
    };
    std::fs::read_to_string(dir.join(name))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| default.to_string())
}

/// Assemble the system+tool-instruction prompt used for every turn.
///
/// Called once at startup; the result is handed to [`crate::agent::AgentRuntime::new`]
/// as its `system_prompt`.
pub fn load_system_prompt() -> String {
    let system = read_or_default("system.md", DEFAULT_SYSTEM_PROMPT);
    let tools = read_or_default("tools.md", DEFAULT_TOOL_INSTRUCTIONS);
    format!("{system}\n\n{tools}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_present_in_prompt() {
        let prompt = format!("{DEFAULT_SYSTEM_PROMPT}\n\n{DEFAULT_TOOL_INSTRUCTIONS}");
        assert!(prompt.contains("helpful local assistant"));
        assert!(prompt.contains("confirmation"));
    }

    #[test]
    fn read_or_default_falls_back_when_missing() {
        // HOME won't have a ~/.zenii/prompts/__nonexistent_marker__.md file.
        let content = read_or_default("__nonexistent_marker__.md", "fallback text");
        assert_eq!(content, "fallback text");
    }
}
