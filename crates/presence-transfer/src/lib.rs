//! Presence Transfer - UDP broadcast transport for the presence mesh
//!
//! This crate provides:
//! - Fire-and-forget broadcast of one observation per datagram
//! - A cancellable receive loop that decodes datagrams and hands them to a handler
//! - The JSON wire codec shared by every node
//!
//! # Design Philosophy
//!
//! There are no acknowledgements, retries or sequence numbers. A lost
//! datagram is simply superseded by the next observation of the same device,
//! and duplicates are harmless because fusion is idempotent. Nothing a peer
//! sends can stop the receive loop; bad datagrams are logged and dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use presence_transfer::{MeshTransport, TransportConfig};
//!
//! let transport = MeshTransport::new(TransportConfig::default());
//! let listener = transport
//!     .start(|ap, device| println!("{} saw {}", ap.client_id, device.mac))
//!     .await?;
//!
//! transport.broadcast(&self_ap, &device).await?;
//!
//! listener.shutdown().await?;
//! ```

pub mod error;
pub mod transport;
pub mod wire;

pub use error::{Error, Result};
pub use transport::{Handler, MeshListener, MeshTransport, TransportConfig, DEFAULT_MESH_PORT};
pub use wire::{decode, encode, MAX_DATAGRAM_LEN, MIN_DATAGRAM_LEN, PROTOCOL_VERSION};
