//! Error types for presence-fusion.

use thiserror::Error;

/// Result type for presence-fusion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fusing mesh observations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The access-point registry has no room for another name.
    #[error("access point registry full ({capacity} entries)")]
    RegistryFull { capacity: usize },

    /// An observation arrived for a device that was never provisioned.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}
