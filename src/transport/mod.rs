//! Transport polymorphism: a small capability set implemented by both the
//! stdio (child process) and SSE (HTTP) transports. `MCPClient` holds one
//! as a trait object and is otherwise transport-agnostic.

pub mod sse;
pub mod stdio;

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::RpcRequest;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Launch/open the transport. Must be called before `send`.
    async fn start(&self) -> Result<()>;

    /// Send a request or notification. Returns `None` for notifications
    /// (no response expected), `Some(value)` with the raw `result`/`error`
    /// envelope for requests.
    async fn send(&self, request: &RpcRequest) -> Result<Option<serde_json::Value>>;

    /// Tear the transport down. Best-effort: failures are logged by the
    /// implementation, never propagated past this call.
    async fn stop(&self);
}
