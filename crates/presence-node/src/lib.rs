//! Presence Node - an access point in the presence mesh
//!
//! Wires the mesh transport to the fusion coordinator and exposes the
//! reporting queries (closest access point, top rooms).
//!
//! # Architecture
//!
//! - **Config**: environment driven settings, coordinate and device files
//! - **Coordinates**: name to position table used to self-identify
//! - **Node**: listener lifecycle, local broadcasts, room scoring
//!
//! # Example
//!
//! ```no_run
//! use presence_node::{NodeConfig, PresenceNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = PresenceNode::from_config(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinates;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use coordinates::CoordinateTable;
pub use error::{Error, Result};
pub use node::PresenceNode;
