use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::ServerSpec;
use crate::error::{McpError, Result};
use crate::protocol::{initialize_params, RpcRequest};
use crate::transport::{SseTransport, StdioTransport, Transport};

/// A single MCP tool descriptor, as returned from `tools/list`, before any
/// namespacing is applied.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// A client bound to one MCP server: owns a transport, performs the
/// handshake, and serializes tool calls against it.
pub struct MCPClient {
    pub name: String,
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    initialized: Mutex<bool>,
    call_lock: Mutex<()>,
}

impl MCPClient {
    pub fn new(spec: &ServerSpec) -> Result<Self> {
        let transport: Arc<dyn Transport> = match spec {
            ServerSpec::Stdio { command, args, env, .. } => {
                Arc::new(StdioTransport::new(command.clone(), args.clone(), env.clone()))
            }
            ServerSpec::Sse { url, .. } => Arc::new(SseTransport::new(url.clone())),
        };
        Ok(Self {
            name: spec.name().to_string(),
            transport,
            next_id: AtomicU64::new(1),
            initialized: Mutex::new(false),
            call_lock: Mutex::new(()),
        })
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn initialize(&self) -> bool {
        let _guard = self.call_lock.lock().await;
        if let Err(e) = self.transport.start().await {
            error!("server '{}' failed to start: {e}", self.name);
            return false;
        }

        let id = self.next_request_id();
        let request = RpcRequest::call(id, "initialize", Some(initialize_params()));
        match self.transport.send(&request).await {
            Ok(_result) => {
                let notify = RpcRequest::notification("notifications/initialized", None);
                if let Err(e) = self.transport.send(&notify).await {
                    warn!("server '{}' rejected notifications/initialized: {e}", self.name);
                }
                *self.initialized.lock().await = true;
                info!("server '{}' initialized", self.name);
                true
            }
            Err(e) => {
                error!("server '{}' failed to initialize: {e}", self.name);
                self.transport.stop().await;
                false
            }
        }
    }

    async fn ensure_initialized(&self) {
        if !*self.initialized.lock().await {
            self.initialize().await;
        }
    }

    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.ensure_initialized().await;
        let _guard = self.call_lock.lock().await;
        let id = self.next_request_id();
        let request = RpcRequest::call(id, "tools/list", Some(serde_json::json!({})));
        match self.transport.send(&request).await {
            Ok(Some(result)) => serde_json::from_value::<ToolsListResult>(result)
                .map(|r| r.tools)
                .unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("server '{}' tools/list failed: {e}", self.name);
                Vec::new()
            }
        }
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Value {
        self.ensure_initialized().await;
        let _guard = self.call_lock.lock().await;
        let id = self.next_request_id();
        let params = serde_json::json!({ "name": tool_name, "arguments": arguments });
        let request = RpcRequest::call(id, "tools/call", Some(params));
        match self.transport.send(&request).await {
            Ok(Some(result)) => result,
            Ok(None) => serde_json::json!({ "error": "empty response" }),
            Err(McpError::Rpc(message)) => serde_json::json!({ "error": message }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        }
    }

    pub async fn shutdown(&self) {
        self.transport.stop().await;
        *self.initialized.lock().await = false;
    }
}

#[derive(serde::Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}
