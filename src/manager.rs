use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{MCPClient, ToolDescriptor};
use crate::config::ServerSpec;

const SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

/// A tool descriptor re-exposed with its namespaced (`<server>__<tool>`)
/// wire identity.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NamespacedTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Fans out across a set of MCP servers: namespaces their tools, caches
/// discovery, and routes calls by splitting the namespaced name.
pub struct ClientManager {
    clients: DashMap<String, Arc<MCPClient>>,
    tool_cache: Mutex<Option<Vec<NamespacedTool>>>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self { clients: DashMap::new(), tool_cache: Mutex::new(None) }
    }

    pub async fn initialize_all(&self, specs: &[ServerSpec]) {
        for spec in specs {
            let name = spec.name().to_string();
            let client = match MCPClient::new(spec) {
                Ok(c) => c,
                Err(e) => {
                    warn!("server '{name}': failed to construct client: {e}");
                    continue;
                }
            };
            if client.initialize().await {
                self.clients.insert(name, Arc::new(client));
            } else {
                warn!("server '{name}': initialization failed, excluding from session");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub async fn get_all_tools(&self, skip_refresh: bool) -> Vec<NamespacedTool> {
        if skip_refresh {
            if let Some(cached) = self.tool_cache.lock().clone() {
                return cached;
            }
        }

        let mut tools = Vec::new();
        for entry in self.clients.iter() {
            let server_name = entry.key().clone();
            let client = Arc::clone(entry.value());
            let descriptors: Vec<ToolDescriptor> = client.list_tools().await;
            for d in descriptors {
                tools.push(NamespacedTool {
                    name: format!("{server_name}__{}", d.name),
                    description: d.description,
                    input_schema: d.input_schema,
                });
            }
        }

        *self.tool_cache.lock() = Some(tools.clone());
        tools
    }

    pub async fn call_tool(&self, namespaced_name: &str, arguments: Value) -> Value {
        let Some((server_name, tool_name)) = namespaced_name.split_once("__") else {
            return serde_json::json!({ "error": format!("Invalid tool name format: {namespaced_name}") });
        };

        let Some(client) = self.clients.get(server_name).map(|c| Arc::clone(&c)) else {
            return serde_json::json!({ "error": format!("Server {server_name} not found") });
        };

        client.call_tool(tool_name, arguments).await
    }

    pub async fn shutdown_all(&self) {
        let clients: Vec<Arc<MCPClient>> =
            self.clients.iter().map(|e| Arc::clone(e.value())).collect();

        let mut handles: Vec<_> = clients
            .into_iter()
            .map(|c| {
                tokio::spawn(async move {
                    c.shutdown().await;
                })
            })
            .collect();

        let joined = futures::future::join_all(handles.iter_mut());
        if tokio::time::timeout(SHUTDOWN_BUDGET, joined).await.is_err() {
            warn!("shutdown_all: exceeded {SHUTDOWN_BUDGET:?} budget, cancelling stragglers");
            for h in &handles {
                h.abort();
            }
        }

        self.clients.clear();
        *self.tool_cache.lock() = None;
        debug!("all MCP clients shut down");
        info!("session shutdown complete");
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}
