//! System and tool-instruction prompt loading for the agent runtime.
//!
//! Replaces the teacher's Tera-templated skills system with the flat
//! static prompt spec.md §4.8 step 3 calls for: a system message plus a
//! short tool-usage note, loaded once from plain text files (or built-in
//! defaults) and reused for every turn.

pub mod loader;

pub use loader::{DEFAULT_SYSTEM_PROMPT, DEFAULT_TOOL_INSTRUCTIONS, load_system_prompt};
