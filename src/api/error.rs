use crate::core::oracle::OracleError;
use crate::core::video::VideoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("Media error: {0}")]
    Media(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }
}
