//! Error types for the presence node.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a node.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Mesh transport error
    #[error("Transport error: {0}")]
    Transport(#[from] presence_transfer::Error),

    /// Fusion error
    #[error("Fusion error: {0}")]
    Fusion(#[from] presence_fusion::Error),

    /// start() called on a node whose listener is already running
    #[error("mesh listener already running")]
    AlreadyRunning,
}
