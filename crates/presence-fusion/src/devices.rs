//! Device table and merge policy.

use crate::model::{Device, DeviceCategory, DeviceId};

/// Folds an incoming observation of a device into the canonical record.
///
/// Implementations must be idempotent and must not change `id` or `mac`.
pub trait DeviceMerge: Send + Sync {
    fn merge(&self, existing: &mut Device, incoming: &Device);
}

/// Default policy: the freshest reading wins, gaps are filled from the incoming record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestWins;

impl DeviceMerge for LatestWins {
    fn merge(&self, existing: &mut Device, incoming: &Device) {
        if incoming.latest >= existing.latest {
            existing.latest = incoming.latest;
            existing.distance = incoming.distance;
        }
        if existing.name.is_empty() && !incoming.name.is_empty() {
            existing.name = incoming.name.clone();
        }
        if existing.category == DeviceCategory::Unknown {
            existing.category = incoming.category;
        }
    }
}

/// Devices known to this node, keyed by MAC.
///
/// Devices are provisioned by the sensing layer or configuration; the mesh
/// only updates records that already exist.
#[derive(Debug, Clone, Default)]
pub struct DeviceTable {
    devices: Vec<Device>,
    next_id: DeviceId,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, assigning the next local id. An already known MAC keeps its record.
    pub fn provision(&mut self, mut device: Device) -> DeviceId {
        if let Some(existing) = self.get(&device.mac) {
            return existing.id;
        }
        device.id = self.next_id;
        self.next_id += 1;
        self.devices.push(device);
        self.next_id - 1
    }

    pub fn get(&self, mac: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.mac.eq_ignore_ascii_case(mac))
    }

    pub fn get_mut(&mut self, mac: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.mac.eq_ignore_ascii_case(mac))
    }

    pub fn by_id(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> Device {
        Device::new("aa:bb:cc:dd:ee:01", "pixel", DeviceCategory::Phone)
    }

    #[test]
    fn provision_assigns_sequential_ids() {
        let mut table = DeviceTable::new();
        let a = table.provision(phone());
        let b = table.provision(Device::new("aa:bb:cc:dd:ee:02", "ipad", DeviceCategory::Tablet));
        let again = table.provision(phone());

        assert_eq!((a, b, again), (0, 1, 0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.by_id(1).unwrap().name, "ipad");
    }

    #[test]
    fn lookup_ignores_mac_case() {
        let mut table = DeviceTable::new();
        table.provision(phone());
        assert!(table.get("AA:BB:CC:DD:EE:01").is_some());
    }

    #[test]
    fn newer_reading_replaces_distance() {
        let mut existing = phone();
        existing.latest = 100;
        existing.distance = 5.0;

        let mut incoming = phone();
        incoming.id = 99;
        incoming.latest = 120;
        incoming.distance = 2.0;

        LatestWins.merge(&mut existing, &incoming);
        assert_eq!(existing.distance, 2.0);
        assert_eq!(existing.latest, 120);
        assert_eq!(existing.id, 0);
    }

    #[test]
    fn older_reading_keeps_distance() {
        let mut existing = phone();
        existing.latest = 100;
        existing.distance = 5.0;

        let mut incoming = phone();
        incoming.latest = 50;
        incoming.distance = 1.0;

        LatestWins.merge(&mut existing, &incoming);
        assert_eq!(existing.distance, 5.0);
        assert_eq!(existing.latest, 100);
    }

    #[test]
    fn merge_fills_gaps_and_is_idempotent() {
        let mut existing = Device::new("aa:bb:cc:dd:ee:01", "", DeviceCategory::Unknown);
        let mut incoming = phone();
        incoming.latest = 10;
        incoming.distance = 3.0;

        LatestWins.merge(&mut existing, &incoming);
        let once = existing.clone();
        LatestWins.merge(&mut existing, &incoming);

        assert_eq!(existing, once);
        assert_eq!(existing.name, "pixel");
        assert_eq!(existing.category, DeviceCategory::Phone);
    }
}
