//! Presence node binary
//!
//! One access point of the presence mesh.

use presence_node::{NodeConfig, PresenceNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "presence_node=info,presence_transfer=info,presence_fusion=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting presence node");

    let config = NodeConfig::from_env()?;

    let node = PresenceNode::from_config(config)?;
    node.run().await?;

    Ok(())
}
