//! A host that mediates between an interactive user, a language model, and
//! one or more MCP tool servers reachable over stdio or SSE.
//!
//! - [`transport`] frames JSON-RPC traffic over a child process or an SSE
//!   stream.
//! - [`client`] performs the MCP handshake and tool calls against a single
//!   server.
//! - [`manager`] fans out across servers, namespaces tools, and routes
//!   calls.
//! - [`chat`] drives the model/tool iteration loop against a bounded
//!   message history.

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use chat::{ChatSession, ModelProvider};
pub use client::MCPClient;
pub use config::{LlmProviderConfig, ServerSpec};
pub use error::{McpError, Result};
pub use manager::ClientManager;
