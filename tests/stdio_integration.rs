//! End-to-end tests against a real child process speaking the stdio framing
//! described in SPEC_FULL §4.1/§6: one JSON-RPC message per line. The
//! fixture below is a tiny POSIX shell script acting as a stub MCP server
//! (scenario S2/S6) -- no mock objects, an actual subprocess over real
//! pipes.

use std::collections::HashMap;

use mcphost::{ClientManager, ServerSpec};

/// A `/bin/sh` one-liner that answers `initialize`, `tools/list`, and
/// `tools/call` by pattern-matching the request line. `tools/call` echoes
/// the `arguments` object it received back as its `text` result so tests
/// can assert on exactly what reached the wire.
const ECHO_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id" ;;
    *'"method":"notifications/initialized"'*)
      : ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"ping","inputSchema":{}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      args=$(printf '%s' "$line" | sed -n 's/.*"arguments":\({[^}]*}\).*/\1/p')
      printf '{"jsonrpc":"2.0","id":%s,"result":{"text":%s}}\n' "$id" "$args" ;;
  esac
done
"#;

fn echo_server_spec(name: &str) -> ServerSpec {
    ServerSpec::Stdio {
        name: name.to_string(),
        command: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), ECHO_SERVER.to_string()],
        env: HashMap::new(),
    }
}

#[tokio::test]
async fn stdio_server_tools_are_namespaced_and_callable() {
    let manager = ClientManager::new();
    manager.initialize_all(&[echo_server_spec("echo")]).await;
    assert!(!manager.is_empty());

    let tools = manager.get_all_tools(false).await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo__ping");

    let result = manager.call_tool("echo__ping", serde_json::json!({})).await;
    assert_eq!(result, serde_json::json!({"text": {}}));

    manager.shutdown_all().await;
    assert!(manager.is_empty());
}

#[tokio::test]
async fn call_tool_rejects_unqualified_names_and_unknown_servers() {
    let manager = ClientManager::new();
    manager.initialize_all(&[echo_server_spec("echo")]).await;

    let missing_separator = manager.call_tool("ping", serde_json::json!({})).await;
    assert_eq!(missing_separator["error"], "Invalid tool name format: ping");

    let unknown_server = manager.call_tool("nope__ping", serde_json::json!({})).await;
    assert_eq!(unknown_server["error"], "Server nope not found");

    manager.shutdown_all().await;
}

/// S6: arguments that reach the wire have already had null-valued keys
/// dropped and `fetch`-suffixed defaults applied by `ChatSession`, so the
/// server only ever sees the cleaned-up object.
#[tokio::test]
async fn stdio_round_trip_carries_cleaned_arguments() {
    let manager = ClientManager::new();
    manager.initialize_all(&[echo_server_spec("echo")]).await;

    let cleaned = serde_json::json!({"url": "x", "max_length": 5000, "start_index": 0});
    let result = manager.call_tool("echo__ping", cleaned.clone()).await;
    assert_eq!(result["text"], cleaned);

    manager.shutdown_all().await;
}
