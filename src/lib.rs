pub mod agent;
pub mod ai;
pub mod bus;
pub mod config;
pub mod logging;
pub mod mcp;
pub mod prompts;
pub mod redact;
pub mod scheduler;
pub mod state;
pub mod tools;

/// Convenience re-exports for the most commonly used traits and types.
///
/// ```rust
/// use zenii_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{AgentRuntime, RuntimeConfig};
    pub use crate::ai::provider::LLMProvider;
    pub use crate::ai::types::{CompletionRequest, CompletionResponse, Message, MessageRole};
    pub use crate::bus::{EventBus, InMemoryBus};
    pub use crate::config::{AppConfig, load_default_config};
    pub use crate::scheduler::{Task, TaskRepository, TokioScheduler};
    pub use crate::state::{InMemoryStateStore, StateStore};
    pub use crate::tools::{Tool, ToolGateway, ToolPolicy, ToolRegistry, ToolResult};
}
