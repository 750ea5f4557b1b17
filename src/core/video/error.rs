use thiserror::Error;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("No frames were sampled from the video")]
    NoFrames,
    #[error("No usable scenes were produced")]
    NoScenes,
    #[error("Invalid selection config: {0}")]
    InvalidConfig(String),
    #[error("Frame metrics worker failed: {0}")]
    MetricsWorker(String),
}
