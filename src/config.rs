//! Parses the persisted JSON configuration document into typed server
//! specs and an optional model-provider config. Malformed entries are
//! logged and skipped rather than failing the whole document, mirroring
//! `ClientManager`'s per-server fault isolation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSpec {
    Stdio { name: String, command: String, args: Vec<String>, env: HashMap<String, String> },
    Sse { name: String, url: String },
}

impl ServerSpec {
    pub fn name(&self) -> &str {
        match self {
            ServerSpec::Stdio { name, .. } => name,
            ServerSpec::Sse { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct LlmProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
struct RawServerEntry {
    #[serde(rename = "type", default = "default_type")]
    transport_type: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    url: Option<String>,
}

fn default_type() -> String {
    "stdio".to_string()
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    #[serde(rename = "mcpServers")]
    mcp_servers: HashMap<String, RawServerEntry>,
    #[serde(rename = "llmProvider", default)]
    llm_provider: Option<LlmProviderConfig>,
}

pub struct ParsedConfig {
    pub servers: Vec<ServerSpec>,
    pub llm_provider: Option<LlmProviderConfig>,
}

/// Default configuration written when no config file exists yet: no
/// servers, a generic Anthropic model.
pub fn default_config_document() -> Value {
    serde_json::json!({
        "mcpServers": {},
        "llmProvider": {
            "type": "anthropic",
            "model": "claude-3-5-sonnet-20240620",
        }
    })
}

pub fn parse(document: &Value) -> ParsedConfig {
    let raw: RawConfig = match serde_json::from_value(document.clone()) {
        Ok(r) => r,
        Err(e) => {
            warn!("failed to parse configuration document: {e}");
            return ParsedConfig { servers: Vec::new(), llm_provider: None };
        }
    };

    let mut servers = Vec::new();
    for (name, entry) in raw.mcp_servers {
        match entry.transport_type.as_str() {
            "stdio" => {
                let Some(command) = entry.command else {
                    warn!("server '{name}': stdio transport requires 'command', skipping");
                    continue;
                };
                servers.push(ServerSpec::Stdio { name, command, args: entry.args, env: entry.env });
            }
            "sse" => {
                let Some(url) = entry.url else {
                    warn!("server '{name}': sse transport requires 'url', skipping");
                    continue;
                };
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    warn!("server '{name}': sse url '{url}' must start with http(s)://, skipping");
                    continue;
                }
                servers.push(ServerSpec::Sse { name, url });
            }
            other => {
                warn!("server '{name}': unknown transport type '{other}', skipping");
            }
        }
    }

    ParsedConfig { servers, llm_provider: raw.llm_provider }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stdio_and_sse_servers() {
        let doc = serde_json::json!({
            "mcpServers": {
                "fs": {"type": "stdio", "command": "mcp-server-fs", "args": ["--root", "/tmp"]},
                "remote": {"type": "sse", "url": "https://example.com/sse"},
            },
            "llmProvider": {"type": "anthropic", "model": "claude-3-5-sonnet-20240620"},
        });
        let parsed = parse(&doc);
        assert_eq!(parsed.servers.len(), 2);
        assert!(parsed.servers.iter().any(|s| matches!(s, ServerSpec::Stdio { command, .. } if command == "mcp-server-fs")));
        assert!(parsed.servers.iter().any(|s| matches!(s, ServerSpec::Sse { url, .. } if url == "https://example.com/sse")));
        assert_eq!(parsed.llm_provider.unwrap().model, "claude-3-5-sonnet-20240620");
    }

    #[test]
    fn skips_stdio_entry_missing_command() {
        let doc = serde_json::json!({"mcpServers": {"bad": {"type": "stdio"}}});
        let parsed = parse(&doc);
        assert!(parsed.servers.is_empty());
    }

    #[test]
    fn skips_sse_entry_with_non_http_url() {
        let doc = serde_json::json!({"mcpServers": {"bad": {"type": "sse", "url": "ftp://example.com"}}});
        let parsed = parse(&doc);
        assert!(parsed.servers.is_empty());
    }

    #[test]
    fn skips_unknown_transport_type() {
        let doc = serde_json::json!({"mcpServers": {"bad": {"type": "websocket", "url": "wss://x"}}});
        let parsed = parse(&doc);
        assert!(parsed.servers.is_empty());
    }

    #[test]
    fn default_type_is_stdio() {
        let doc = serde_json::json!({"mcpServers": {"fs": {"command": "mcp-server-fs"}}});
        let parsed = parse(&doc);
        assert_eq!(parsed.servers.len(), 1);
        assert!(matches!(parsed.servers[0], ServerSpec::Stdio { .. }));
    }

    #[test]
    fn default_config_document_has_no_servers() {
        let doc = default_config_document();
        let parsed = parse(&doc);
        assert!(parsed.servers.is_empty());
        assert_eq!(parsed.llm_provider.unwrap().provider_type, "anthropic");
    }
}
