use thiserror::Error;

/// Crate-wide error type. Variants line up with the error-kind table used
/// throughout `transport`, `client`, and `manager`.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to connect to server '{server}': {reason}")]
    Connect { server: String, reason: String },

    #[error("framing error: {0}")]
    Framing(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("rpc error from server: {0}")]
    Rpc(String),

    #[error("tool dispatch error: {0}")]
    ToolDispatch(String),

    #[error("shutdown stalled for '{0}'")]
    ShutdownStall(String),

    #[error("reached the maximum number of tool interactions ({0})")]
    ModelIteration(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, McpError>;
