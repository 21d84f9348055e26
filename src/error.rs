use thiserror::Error;

/// Failures talking to the upstream board (or reading a captured snapshot).
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("JSON-RPC response id {got} does not match request id {expected}")]
    IdMismatch { expected: String, got: String },

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the analytics pipeline to its caller.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("project {project_id}: {source}")]
    Upstream {
        project_id: i64,
        #[source]
        source: UpstreamError,
    },

    #[error("upstream fetch failed: {0}")]
    Fetch(#[from] UpstreamError),

    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("fetch task did not complete: {0}")]
    Join(String),
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
