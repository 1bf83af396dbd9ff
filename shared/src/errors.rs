/// Unified error types for PDF Harvest.
use thiserror::Error;

/// Top-level error type. Anything surfacing as this aborts the run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run cancelled")]
    Cancelled,
}

/// Errors raised by the remote messaging API.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Message {0} has no downloadable attachment")]
    MissingAttachment(i32),
}

/// Failure of a single download attempt. Contained by the coordinator.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for fatal-path operations.
pub type HarvestResult<T> = Result<T, HarvestError>;
