//! Error types for the pipeline.

use thiserror::Error;

/// Main error type delivered to `on_failure` callbacks.
///
/// The core never classifies or wraps producer failures; whatever a producer
/// reports is passed through verbatim as the terminal outcome.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source failed: {0}")]
    Source(String),
}

impl LinkError {
    /// Terminal failure reported by a producer.
    pub fn source(message: impl Into<String>) -> Self {
        LinkError::Source(message.into())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, LinkError>;
