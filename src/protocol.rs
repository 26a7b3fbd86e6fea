//! JSON-RPC 2.0 message shapes used by the MCP wire protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const CLIENT_NAME: &str = "mcphost-python";
pub const CLIENT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn call(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// An incoming line off a transport: a response keyed by id, or a
/// notification (has `method`, no `id`). Deserialized loosely because a
/// single stream interleaves both.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcMessage {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.is_some()
    }

    pub fn matches(&self, id: u64) -> bool {
        self.id == Some(id)
    }
}

pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "clientInfo": { "name": CLIENT_NAME, "version": CLIENT_VERSION },
        "capabilities": {},
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_request_serializes_with_id() {
        let req = RpcRequest::call(1, "tools/list", Some(serde_json::json!({})));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 1);
        assert_eq!(value["method"], "tools/list");
    }

    #[test]
    fn notification_serializes_without_id_field_value() {
        let req = RpcRequest::notification("notifications/initialized", None);
        assert!(req.is_notification());
        let value = serde_json::to_value(&req).unwrap();
        assert!(!value.as_object().unwrap().contains_key("id"));
        assert!(value.get("params").is_none());
    }

    #[test]
    fn message_with_method_and_no_id_is_a_notification() {
        let msg: RpcMessage = serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#).unwrap();
        assert!(msg.is_notification());
    }

    #[test]
    fn message_matches_only_its_own_id() {
        let msg: RpcMessage = serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":{}}"#).unwrap();
        assert!(msg.matches(7));
        assert!(!msg.matches(8));
    }
}
