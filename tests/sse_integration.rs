//! End-to-end tests against a real HTTP server for the SSE transport
//! (SPEC_FULL §4.2/§6): a GET stream carrying an `endpoint` event followed
//! by `message` events, and JSON-RPC requests delivered by POST to that
//! endpoint. `wiremock` stands in for the tool server.

use mcphost::{ClientManager, ServerSpec};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse_server_spec(name: &str, url: String) -> ServerSpec {
    ServerSpec::Sse { name: name.to_string(), url }
}

#[tokio::test]
async fn sse_server_initializes_over_endpoint_and_message_events() {
    let mock_server = MockServer::start().await;

    let body = concat!(
        "event: endpoint\n",
        "data: /messages?session_id=abc123\n",
        "\n",
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n",
        "\n",
        "event: message\n",
        "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[{\"name\":\"ping\",\"inputSchema\":{}}]}}\n",
        "\n",
    );

    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(body, "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    let manager = ClientManager::new();
    let spec = sse_server_spec("remote", format!("{}/sse", mock_server.uri()));
    manager.initialize_all(&[spec]).await;

    assert!(!manager.is_empty(), "client should have initialized against the staged endpoint event");

    let tools = manager.get_all_tools(false).await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "remote__ping");

    manager.shutdown_all().await;
}

/// S5: the SSE GET succeeds but never emits an `endpoint` event. `initialize`
/// must time out (bounded, not hung) and the server must be excluded.
#[tokio::test]
async fn sse_server_missing_endpoint_event_is_excluded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(": keep-alive\n\n", "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    let manager = ClientManager::new();
    let spec = sse_server_spec("remote", format!("{}/sse", mock_server.uri()));
    manager.initialize_all(&[spec]).await;

    assert!(manager.is_empty(), "a server that never sends 'endpoint' must never be initialized");
}
