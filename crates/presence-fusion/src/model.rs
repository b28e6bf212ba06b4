//! Core types shared by the fusion components.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Sequence id assigned to an access point by the local registry.
pub type AccessPointId = u32;

/// Local id of a provisioned device.
pub type DeviceId = u32;

/// Unix time in seconds.
pub type Timestamp = i64;

/// Current unix time in seconds. Zero if the clock is before the epoch.
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as Timestamp)
        .unwrap_or(0)
}

/// Longest access point name accepted from the mesh.
pub const MAX_CLIENT_ID_LEN: usize = 32;

/// Position of an access point in building coordinates (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// Sentinel for an access point whose location is not configured.
    pub const UNKNOWN: Position = Position {
        x: -1.0,
        y: -1.0,
        z: -1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::UNKNOWN
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// A fixed mesh node that senses devices and broadcasts observations.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPoint {
    /// Local sequence id. Placeholder (0) until the registry interns the record.
    pub id: AccessPointId,
    /// Mesh-unique name.
    pub client_id: String,
    /// Configured location, used by trilateration consumers.
    pub position: Position,
}

impl AccessPoint {
    /// Create an access point that has not been interned yet.
    pub fn new(client_id: impl Into<String>, position: Position) -> Self {
        Self {
            id: 0,
            client_id: client_id.into(),
            position,
        }
    }
}

impl fmt::Display for AccessPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {:>20} ({:.1},{:.1},{:.1})",
            self.id, self.client_id, self.position.x, self.position.y, self.position.z
        )
    }
}

/// Kind of device, as reported by the sensing layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    #[default]
    Unknown,
    Phone,
    Tablet,
    Computer,
    Watch,
    Beacon,
}

/// A mobile device tracked by the mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Local id. Never taken from a remote node.
    #[serde(default)]
    pub id: DeviceId,
    /// Hardware address, `aa:bb:cc:dd:ee:ff`.
    pub mac: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: DeviceCategory,
    /// Last estimated distance in metres.
    #[serde(default)]
    pub distance: f64,
    /// When the device was last observed.
    #[serde(default)]
    pub latest: Timestamp,
}

impl Device {
    pub fn new(mac: impl Into<String>, name: impl Into<String>, category: DeviceCategory) -> Self {
        Self {
            id: 0,
            mac: mac.into(),
            name: name.into(),
            category,
            distance: 0.0,
            latest: 0,
        }
    }
}

/// A fixed beacon recognised by MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub name: String,
    pub mac_address: String,
    pub mac64: i64,
    pub alias: String,
}

impl Beacon {
    /// Build a beacon, deriving `mac64` from the address. Returns `None` for a malformed MAC.
    pub fn new(name: impl Into<String>, mac_address: impl Into<String>, alias: impl Into<String>) -> Option<Self> {
        let mac_address = mac_address.into();
        let mac64 = parse_mac64(&mac_address)?;
        Some(Self {
            name: name.into(),
            mac_address,
            mac64,
            alias: alias.into(),
        })
    }
}

/// Read-only set of beacons loaded with the configuration.
#[derive(Debug, Clone, Default)]
pub struct BeaconSet {
    beacons: Vec<Beacon>,
}

impl BeaconSet {
    pub fn new(beacons: Vec<Beacon>) -> Self {
        Self { beacons }
    }

    pub fn find_by_mac(&self, mac: &str) -> Option<&Beacon> {
        let mac64 = parse_mac64(mac)?;
        self.beacons.iter().find(|b| b.mac64 == mac64)
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&Beacon> {
        self.beacons.iter().find(|b| b.alias == alias)
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }
}

/// Pack a colon separated 48-bit MAC address into an integer.
pub fn parse_mac64(mac: &str) -> Option<i64> {
    let mut value: i64 = 0;
    let mut octets = 0;
    for part in mac.split(':') {
        if part.len() != 2 {
            return None;
        }
        let byte = u8::from_str_radix(part, 16).ok()?;
        value = (value << 8) | i64::from(byte);
        octets += 1;
    }
    (octets == 6).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac64_packs_octets() {
        assert_eq!(parse_mac64("00:00:00:00:01:02"), Some(0x0102));
        assert_eq!(parse_mac64("FF:ff:00:00:00:00"), Some(0xffff_0000_0000));
    }

    #[test]
    fn mac64_rejects_malformed() {
        assert_eq!(parse_mac64(""), None);
        assert_eq!(parse_mac64("00:11:22:33:44"), None);
        assert_eq!(parse_mac64("00:11:22:33:44:55:66"), None);
        assert_eq!(parse_mac64("0g:11:22:33:44:55"), None);
        assert_eq!(parse_mac64("001:1:22:33:44:55"), None);
    }

    #[test]
    fn beacon_lookup_ignores_mac_case() {
        let set = BeaconSet::new(vec![
            Beacon::new("keys", "aa:bb:cc:00:11:22", "car-keys").unwrap(),
            Beacon::new("bag", "aa:bb:cc:00:11:33", "gym-bag").unwrap(),
        ]);

        assert_eq!(set.find_by_mac("AA:BB:CC:00:11:33").unwrap().name, "bag");
        assert_eq!(set.find_by_alias("car-keys").unwrap().name, "keys");
        assert!(set.find_by_mac("aa:bb:cc:00:11:44").is_none());
        assert!(set.find_by_mac("not a mac").is_none());
    }

    #[test]
    fn unknown_position_sentinel() {
        assert!(Position::default().is_unknown());
        assert!(!Position::new(10.0, 0.5, 2.0).is_unknown());
    }

    #[test]
    fn device_category_uses_snake_case() {
        // serde naming is part of the wire contract
        let device: Device = serde_json::from_str(
            r#"{"mac":"aa:bb:cc:dd:ee:ff","category":"watch"}"#,
        )
        .unwrap();
        assert_eq!(device.category, DeviceCategory::Watch);
        assert_eq!(device.name, "");
    }
}
