use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::error::{McpError, Result};
use crate::protocol::RpcRequest;

use super::Transport;

const OVERALL_SEND_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(2);
const STDERR_JOIN_TIMEOUT: Duration = Duration::from_secs(1);
const EXIT_WAIT_TIMEOUT: Duration = Duration::from_secs(3);
const TERM_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Launches a child process and frames line-delimited JSON over its
/// stdin/stdout. Stderr is drained into logs by a background task.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    stdout: Mutex<Option<BufReader<ChildStdout>>>,
    stderr_stop: Mutex<Option<watch::Sender<bool>>>,
    stderr_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StdioTransport {
    pub fn new(command: String, args: Vec<String>, env: HashMap<String, String>) -> Self {
        Self {
            command,
            args,
            env,
            child: Mutex::new(None),
            stdin: Mutex::new(None),
            stdout: Mutex::new(None),
            stderr_stop: Mutex::new(None),
            stderr_task: Mutex::new(None),
        }
    }

    async fn read_one_line(stdout: &mut BufReader<ChildStdout>) -> Result<String> {
        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, stdout.read_line(&mut line))
            .await
            .map_err(|_| McpError::Timeout("stdio read".into()))??;
        if n == 0 {
            return Err(McpError::Framing("stdout closed".into()));
        }
        Ok(line)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self) -> Result<()> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(McpError::Io)?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    line = reader.next_line() => {
                        match line {
                            Ok(Some(l)) => debug!(target: "mcphost::stdio::stderr", "{l}"),
                            Ok(None) => break,
                            Err(e) => {
                                warn!("stderr reader error: {e}");
                                break;
                            }
                        }
                    }
                }
            }
        });

        *self.child.lock().await = Some(child);
        *self.stdin.lock().await = Some(stdin);
        *self.stdout.lock().await = Some(BufReader::new(stdout));
        *self.stderr_stop.lock().await = Some(stop_tx);
        *self.stderr_task.lock().await = Some(task);
        Ok(())
    }

    async fn send(&self, request: &RpcRequest) -> Result<Option<serde_json::Value>> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        {
            let mut guard = self.stdin.lock().await;
            let stdin = guard
                .as_mut()
                .ok_or_else(|| McpError::Connect { server: self.command.clone(), reason: "not started".into() })?;
            stdin.write_all(line.as_bytes()).await.map_err(McpError::Io)?;
            stdin.flush().await.map_err(McpError::Io)?;
        }

        if request.is_notification() {
            return Ok(None);
        }

        let request_id = request.id.expect("request has id");
        let deadline = tokio::time::Instant::now() + OVERALL_SEND_TIMEOUT;

        let mut guard = self.stdout.lock().await;
        let stdout = guard
            .as_mut()
            .ok_or_else(|| McpError::Connect { server: self.command.clone(), reason: "not started".into() })?;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(McpError::Timeout(format!("response to request {request_id}")));
            }
            let line = match Self::read_one_line(stdout).await {
                Ok(l) => l,
                Err(McpError::Timeout(_)) => continue,
                Err(e) => return Err(e),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let msg: crate::protocol::RpcMessage = match serde_json::from_str(trimmed) {
                Ok(m) => m,
                Err(e) => {
                    warn!("dropping unparseable stdio line: {e}");
                    continue;
                }
            };
            if msg.is_notification() {
                continue;
            }
            if !msg.matches(request_id) {
                warn!(
                    "skipping response with mismatched id (expected {request_id}, got {:?})",
                    msg.id
                );
                continue;
            }
            if let Some(err) = msg.error {
                return Err(McpError::Rpc(err.message));
            }
            return Ok(msg.result);
        }
    }

    async fn stop(&self) {
        if let Some(tx) = self.stderr_stop.lock().await.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.stderr_task.lock().await.take() {
            let _ = timeout(STDERR_JOIN_TIMEOUT, task).await;
        }

        self.stdin.lock().await.take();

        let mut child_guard = self.child.lock().await;
        let Some(mut child) = child_guard.take() else {
            return;
        };

        if timeout(EXIT_WAIT_TIMEOUT, child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
        if timeout(TERM_WAIT_TIMEOUT, child.wait()).await.is_ok() {
            return;
        }

        if let Err(e) = child.start_kill() {
            error!("failed to SIGKILL child process: {e}");
        }
        let _ = child.wait().await;
    }
}
