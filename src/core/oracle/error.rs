use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),
    #[error("IFLOW_API_KEY is not set")]
    MissingApiKey,
    #[error("Malformed oracle response: {0}")]
    Malformed(String),
    #[error("Oracle returned an empty response")]
    EmptyResponse,
}
