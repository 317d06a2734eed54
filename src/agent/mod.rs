//! The conversational agent runtime: a topic-subscribed state machine that
//! turns `input.text` events into LLM/tool-call turns and `output.text`
//! events, per spec.md §4.8.
//!
//! # Key types
//! - [`AgentRuntime`] — the IDLE/AWAITING_CONFIRM state machine
//! - [`RuntimeConfig`] — model id, tool-step cap, history window
//! - [`events::InputText`] / [`events::OutputText`] — bus payload shapes

pub mod events;
pub mod runtime;

pub use events::{InputSource, InputText, InputTextPartial, OutputText};
pub use runtime::{AgentRuntime, RuntimeConfig};
