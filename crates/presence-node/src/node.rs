//! Presence node - the access point process.
//!
//! Architecture:
//! - One mesh listener task feeding received observations into the fusion coordinator
//! - Local sensing reports go out as mesh broadcasts (and loop back to our own listener)
//! - Reporting reads closest-access-point answers from any task

use std::net::SocketAddr;
use std::sync::Arc;

use presence_fusion::{
    tally_groups, top_k, AccessPoint, Closest, Device, Error as FusionError, FusionCoordinator,
    Group, Room,
};
use presence_transfer::{MeshListener, MeshTransport, TransportConfig};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::coordinates::CoordinateTable;
use crate::error::{Error, Result};

/// A presence mesh node.
pub struct PresenceNode {
    config: NodeConfig,
    self_ap: AccessPoint,
    fusion: Arc<FusionCoordinator>,
    transport: MeshTransport,
    listener: Option<MeshListener>,
}

impl PresenceNode {
    /// Create a node, resolving our own position from `coordinates`.
    pub fn new(config: NodeConfig, coordinates: &CoordinateTable) -> Self {
        let self_ap = coordinates.self_access_point(&config.client_id);
        let fusion = Arc::new(FusionCoordinator::new(config.fusion_config()));
        let transport = MeshTransport::new(config.transport_config());

        Self {
            config,
            self_ap,
            fusion,
            transport,
            listener: None,
        }
    }

    /// Create a node, loading the coordinates and device files named in `config`.
    pub fn from_config(config: NodeConfig) -> Result<Self> {
        let coordinates = match &config.coordinates_path {
            Some(path) => CoordinateTable::load(path)?,
            None => CoordinateTable::new(),
        };
        let devices = config.load_devices()?;

        let node = Self::new(config, &coordinates);
        for device in devices {
            node.fusion.provision_device(device);
        }
        Ok(node)
    }

    /// Replace the transport settings (e.g. loopback addresses in tests).
    #[must_use]
    pub fn with_transport_config(mut self, transport: TransportConfig) -> Self {
        self.transport = MeshTransport::new(transport);
        self
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The access point record this node broadcasts as.
    pub fn self_access_point(&self) -> &AccessPoint {
        &self.self_ap
    }

    /// Shared fusion state (for reporting).
    pub fn fusion(&self) -> Arc<FusionCoordinator> {
        Arc::clone(&self.fusion)
    }

    /// Start the mesh listener. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.listener.as_ref().is_some_and(|l| !l.is_stopped()) {
            return Err(Error::AlreadyRunning);
        }

        let fusion = Arc::clone(&self.fusion);
        let listener = self
            .transport
            .start(move |ap, device| match fusion.on_message(ap, device) {
                Ok(_) => {}
                Err(e @ FusionError::UnknownDevice(_)) => debug!("{}", e),
                Err(e) => warn!("Dropping mesh message: {}", e),
            })
            .await?;

        let addr = listener.local_addr();
        info!("Local client id is {}", self.self_ap.client_id);
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Broadcast a locally sensed device observation to the mesh.
    pub async fn report_local(&self, device: &Device) -> Result<usize> {
        Ok(self.transport.broadcast(&self.self_ap, device).await?)
    }

    /// Closest access point for a device.
    pub fn closest(&self, mac: &str) -> Option<Closest> {
        self.fusion.closest_for(mac)
    }

    /// Score rooms from current closest-access-point answers.
    ///
    /// Each room is served by the access point of the same name. Every device
    /// adds one to the room of its closest access point. Group totals are
    /// recomputed afterwards.
    pub fn scan_rooms(&self, rooms: &mut [Room], groups: &mut [Group]) {
        for room in rooms.iter_mut() {
            room.reset();
        }

        for device in self.fusion.devices() {
            let Some(closest) = self.fusion.closest_by_id(device.id) else {
                continue;
            };
            if let Some(room) = rooms
                .iter_mut()
                .find(|r| r.name == closest.access_point.client_id)
            {
                room.add_observation(device.category, 1.0);
            }
        }

        tally_groups(rooms, groups);
    }

    /// Log where every tracked device currently is.
    pub fn log_summary(&self) {
        for device in self.fusion.devices() {
            match self.fusion.closest_by_id(device.id) {
                Some(closest) => info!(
                    "{} '{}' closest to '{}' at {:.1}m",
                    device.mac, device.name, closest.access_point.client_id, closest.observation.distance
                ),
                None => debug!("{} '{}' not seen", device.mac, device.name),
            }
        }
    }

    /// Top `k` rooms by score.
    pub fn top_rooms<'a>(&self, rooms: &'a [Room], k: usize) -> Vec<&'a Room> {
        top_k(rooms, k)
    }

    /// Stop the mesh listener and wait for it to exit.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(listener) = self.listener.take() {
            listener.shutdown().await?;
        }
        Ok(())
    }

    /// Run until Ctrl-C, logging a summary every `report_interval`.
    pub async fn run(mut self) -> Result<()> {
        info!("Presence node starting");
        info!("  Client: {}", self.self_ap);
        info!("  Mesh:   {}", self.config.transport_config().bind);
        info!("  Devices: {}", self.fusion.devices().len());

        self.start().await?;

        let mut ticker = tokio::time::interval(self.config.report_interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.log_summary(),
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!("Failed to listen for Ctrl-C: {}", e);
                    }
                    break;
                }
            }
        }

        self.shutdown().await?;
        info!("Presence node stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_fusion::{DeviceCategory, Position};
    use std::time::Duration;

    const PHONE: &str = "aa:bb:cc:dd:ee:01";
    const WATCH: &str = "aa:bb:cc:dd:ee:02";

    fn node(name: &str) -> PresenceNode {
        let mut coordinates = CoordinateTable::new();
        coordinates.insert("kitchen", Position::new(46.0, -24.0, 2.0));

        let config = NodeConfig {
            client_id: name.to_string(),
            ..Default::default()
        };
        let node = PresenceNode::new(config, &coordinates).with_transport_config(TransportConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            broadcast: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        });
        node.fusion.provision_device(Device::new(PHONE, "pixel", DeviceCategory::Phone));
        node.fusion.provision_device(Device::new(WATCH, "watch", DeviceCategory::Watch));
        node
    }

    fn seen(mac: &str, distance: f64, latest: i64) -> Device {
        let mut device = Device::new(mac, "", DeviceCategory::Unknown);
        device.distance = distance;
        device.latest = latest;
        device
    }

    #[test]
    fn self_position_from_coordinates() {
        assert_eq!(node("kitchen").self_access_point().position, Position::new(46.0, -24.0, 2.0));
        assert!(node("attic").self_access_point().position.is_unknown());
    }

    #[tokio::test]
    async fn peer_report_is_fused() {
        let mut receiver = node("study");
        let addr = receiver.start().await.unwrap();

        let sender = node("kitchen").with_transport_config(TransportConfig {
            broadcast: addr,
            ..Default::default()
        });
        sender.report_local(&seen(PHONE, 2.0, 1_700_000_000)).await.unwrap();

        let mut closest = None;
        for _ in 0..100 {
            closest = receiver.closest(PHONE);
            if closest.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let closest = closest.expect("observation never fused");
        assert_eq!(closest.access_point.client_id, "kitchen");
        assert_eq!(closest.access_point.position, Position::new(46.0, -24.0, 2.0));
        assert_eq!(receiver.fusion().device(PHONE).unwrap().distance, 2.0);

        receiver.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut node = node("study");
        node.start().await.unwrap();
        assert!(matches!(node.start().await, Err(Error::AlreadyRunning)));

        node.shutdown().await.unwrap();
        node.shutdown().await.unwrap();
        node.start().await.unwrap();
        node.shutdown().await.unwrap();
    }

    #[test]
    fn scan_rooms_counts_devices() {
        let node = node("study");
        let fusion = node.fusion();
        let ap = |name: &str| AccessPoint::new(name, Position::UNKNOWN);

        fusion.on_message(ap("kitchen"), seen(PHONE, 3.0, 100)).unwrap();
        fusion.on_message(ap("study"), seen(PHONE, 1.0, 105)).unwrap();
        fusion.on_message(ap("kitchen"), seen(WATCH, 2.0, 100)).unwrap();

        let mut rooms = vec![
            Room::new("kitchen", "downstairs"),
            Room::new("study", "upstairs"),
            Room::with_score("garage", "outside", 7.0),
        ];
        let mut groups = vec![Group::new("downstairs"), Group::new("upstairs")];

        node.scan_rooms(&mut rooms, &mut groups);

        assert_eq!(rooms[0].watch_total, 1.0);
        assert_eq!(rooms[1].phone_total, 1.0);
        // Stale score cleared by the scan.
        assert_eq!(rooms[2].room_score, 0.0);
        assert_eq!(groups[0].group_total, 1.0);
        assert_eq!(groups[1].group_total, 1.0);

        let top: Vec<_> = node.top_rooms(&rooms, 2).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(top, ["kitchen", "study"]);
    }
}
