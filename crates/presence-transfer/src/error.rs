//! Error types for presence-transfer.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type for presence-transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the mesh transport.
#[derive(Debug, Error)]
pub enum Error {
    /// The receive socket could not be set up. Fatal for `start()`.
    #[error("failed to bind mesh socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO error on an established socket.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Datagram below the minimum viable message size.
    #[error("datagram too short: {0} bytes")]
    Truncated(usize),

    /// Datagram could not be decoded into an observation.
    #[error("malformed message: {0}")]
    Decode(String),

    /// Message carries a wire version this node does not speak.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    /// Observation could not be serialized.
    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The receive task panicked or was aborted.
    #[error("listener task failed: {0}")]
    Join(String),
}
