//! Model Context Protocol client.
//!
//! Connects to zero or more configured remote tool servers over one of
//! three transports (stdio, SSE, streamable HTTP), lists each server's
//! tools, and registers them into the shared [`crate::tools::ToolRegistry`]
//! under the `mcp.<server>.<tool>` namespace. Grounded in the teacher's
//! `modules::mcp_client` for the stdio JSON-RPC plumbing, extended per
//! `original_source/src/friday/mcp/client.py` for the sse/http transports
//! and the dot-separated namespacing convention.

pub mod client;
pub mod config;
pub mod http;
pub mod sse;
pub mod stdio;
pub mod types;

pub use client::{McpClient, McpTransport};
pub use config::{McpConfig, McpServerConfig, TransportKind, load_mcp_config};
pub use types::{McpError, McpToolDescriptor};
