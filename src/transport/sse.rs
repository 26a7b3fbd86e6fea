use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use rand::Rng;
use tokio::sync::{Mutex, Notify};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::error::{McpError, Result};
use crate::protocol::RpcRequest;

use super::Transport;

const ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
const RESPONSE_POLL: Duration = Duration::from_millis(500);
const PARSER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

fn generate_session_id() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("mcp-host-{suffix:016x}")
}

#[derive(Default)]
struct SseState {
    endpoint_url: Option<String>,
    queue: VecDeque<crate::protocol::RpcMessage>,
}

/// SSE + HTTP-POST transport. A GET stream delivers an `endpoint` event
/// (where to POST) followed by `message` events (JSON-RPC traffic); sends
/// POST to the endpoint and correlate responses by id off the same stream.
pub struct SseTransport {
    sse_url: String,
    base_url: String,
    client: reqwest::Client,
    session_id: Mutex<String>,
    state: Arc<Mutex<SseState>>,
    notify: Arc<Notify>,
    parser_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    parser_stop: Mutex<Option<tokio::sync::watch::Sender<bool>>>,
}

impl SseTransport {
    pub fn new(sse_url: String) -> Self {
        let base_url = sse_url
            .trim_end_matches('/')
            .rsplit_once("/sse")
            .map(|(base, _)| base.to_string())
            .unwrap_or_else(|| sse_url.trim_end_matches('/').to_string());
        Self {
            sse_url,
            base_url,
            client: reqwest::Client::new(),
            session_id: Mutex::new(generate_session_id()),
            state: Arc::new(Mutex::new(SseState::default())),
            notify: Arc::new(Notify::new()),
            parser_task: Mutex::new(None),
            parser_stop: Mutex::new(None),
        }
    }

    fn resolve_endpoint(&self, raw: &str) -> String {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("{}{}", self.base_url, raw)
        }
    }

    fn extract_session_id(endpoint: &str) -> Option<String> {
        let url = Url::parse(endpoint).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "session_id")
            .map(|(_, v)| v.into_owned())
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&self) -> Result<()> {
        let session_id = self.session_id.lock().await.clone();
        let url = format!("{}?session_id={}", self.sse_url, session_id);

        let response = self.client.get(&url).send().await.map_err(McpError::Http)?;
        if !response.status().is_success() {
            return Err(McpError::Connect {
                server: self.sse_url.clone(),
                reason: format!("SSE GET returned {}", response.status()),
            });
        }

        let byte_stream = response.bytes_stream();
        let mut events = byte_stream.eventsource();

        let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
        let state = Arc::clone(&self.state);
        let notify = Arc::clone(&self.notify);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    ev = events.next() => {
                        match ev {
                            Some(Ok(event)) => {
                                match event.event.as_str() {
                                    "endpoint" => {
                                        let mut st = state.lock().await;
                                        st.endpoint_url = Some(event.data);
                                        notify.notify_waiters();
                                    }
                                    "message" => {
                                        match serde_json::from_str::<crate::protocol::RpcMessage>(&event.data) {
                                            Ok(msg) => {
                                                let mut st = state.lock().await;
                                                st.queue.push_back(msg);
                                                notify.notify_waiters();
                                            }
                                            Err(e) => warn!("dropping unparseable SSE message event: {e}"),
                                        }
                                    }
                                    other => debug!("ignoring SSE event type '{other}'"),
                                }
                            }
                            Some(Err(e)) => {
                                warn!("SSE stream error: {e}");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
        });
        *self.parser_task.lock().await = Some(task);
        *self.parser_stop.lock().await = Some(stop_tx);

        let deadline = Instant::now() + ENDPOINT_TIMEOUT;
        loop {
            {
                let st = self.state.lock().await;
                if let Some(endpoint) = st.endpoint_url.clone() {
                    drop(st);
                    let resolved = self.resolve_endpoint(&endpoint);
                    if let Some(sid) = Self::extract_session_id(&resolved) {
                        *self.session_id.lock().await = sid;
                    }
                    let mut st = self.state.lock().await;
                    st.endpoint_url = Some(resolved);
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(McpError::Timeout("SSE endpoint event".into()));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            let _ = timeout(remaining, self.notify.notified()).await;
        }
    }

    async fn send(&self, request: &RpcRequest) -> Result<Option<serde_json::Value>> {
        let endpoint = {
            let st = self.state.lock().await;
            st.endpoint_url
                .clone()
                .ok_or_else(|| McpError::Connect { server: self.sse_url.clone(), reason: "not started".into() })?
        };

        let body = serde_json::to_value(request)?;
        let response = self.client.post(&endpoint).json(&body).send().await.map_err(McpError::Http)?;
        let status = response.status();
        if status.as_u16() != 200 && status.as_u16() != 202 {
            return Err(McpError::Connect {
                server: self.sse_url.clone(),
                reason: format!("POST returned {status}"),
            });
        }

        if request.is_notification() {
            return Ok(None);
        }
        let request_id = request.id.expect("request has id");

        let deadline = Instant::now() + RESPONSE_TIMEOUT;
        loop {
            {
                let mut st = self.state.lock().await;
                let mut requeue = VecDeque::new();
                let mut found = None;
                while let Some(msg) = st.queue.pop_front() {
                    if found.is_none() && !msg.is_notification() && msg.matches(request_id) {
                        found = Some(msg);
                    } else {
                        requeue.push_back(msg);
                    }
                }
                st.queue = requeue;
                if let Some(msg) = found {
                    drop(st);
                    if let Some(err) = msg.error {
                        return Err(McpError::Rpc(err.message));
                    }
                    return Ok(msg.result);
                }
            }
            if Instant::now() >= deadline {
                return Err(McpError::Timeout(format!("response to request {request_id}")));
            }
            sleep(RESPONSE_POLL).await;
        }
    }

    async fn stop(&self) {
        if let Some(tx) = self.parser_stop.lock().await.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.parser_task.lock().await.take() {
            let _ = timeout(PARSER_SHUTDOWN_TIMEOUT, task).await;
        }
    }
}
