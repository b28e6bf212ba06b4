//! Mesh wire format.
//!
//! One JSON object per datagram:
//!
//! ```text
//! {
//!   "v": 1,
//!   "access_point": { "client_id": "kitchen", "x": 46.0, "y": -24.0, "z": 2.0 },
//!   "device": { "mac": "aa:bb:cc:dd:ee:ff", "name": "pixel", "category": "phone",
//!               "distance": 2.4, "latest": 1700000000 }
//! }
//! ```
//!
//! `v` and the coordinates are optional on decode. Missing coordinates mean
//! "not configured" and decode to [`Position::UNKNOWN`]. Trailing NUL bytes
//! from C senders are ignored.

use presence_fusion::{AccessPoint, Device, DeviceCategory, Position, Timestamp, MAX_CLIENT_ID_LEN};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current wire version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Anything shorter cannot be a device message.
pub const MIN_DATAGRAM_LEN: usize = 10;

/// Receive buffer size; larger datagrams are truncated and fail to decode.
pub const MAX_DATAGRAM_LEN: usize = 2048;

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(default = "default_version")]
    v: u8,
    access_point: WireAccessPoint,
    device: WireDevice,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireAccessPoint {
    client_id: String,
    #[serde(default = "unknown_coordinate")]
    x: f64,
    #[serde(default = "unknown_coordinate")]
    y: f64,
    #[serde(default = "unknown_coordinate")]
    z: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDevice {
    mac: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: DeviceCategory,
    distance: f64,
    latest: Timestamp,
}

fn default_version() -> u8 {
    PROTOCOL_VERSION
}

fn unknown_coordinate() -> f64 {
    Position::UNKNOWN.x
}

/// Encode one observation as a datagram payload.
pub fn encode(access_point: &AccessPoint, device: &Device) -> Result<Vec<u8>> {
    let message = WireMessage {
        v: PROTOCOL_VERSION,
        access_point: WireAccessPoint {
            client_id: access_point.client_id.clone(),
            x: access_point.position.x,
            y: access_point.position.y,
            z: access_point.position.z,
        },
        device: WireDevice {
            mac: device.mac.clone(),
            name: device.name.clone(),
            category: device.category,
            distance: device.distance,
            latest: device.latest,
        },
    };
    Ok(serde_json::to_vec(&message)?)
}

/// Decode a datagram payload.
///
/// The returned access point carries a placeholder id and the device a zero
/// id; both are assigned locally during fusion.
pub fn decode(datagram: &[u8]) -> Result<(AccessPoint, Device)> {
    if datagram.len() < MIN_DATAGRAM_LEN {
        return Err(Error::Truncated(datagram.len()));
    }

    let end = datagram
        .iter()
        .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);

    let message: WireMessage =
        serde_json::from_slice(&datagram[..end]).map_err(|e| Error::Decode(e.to_string()))?;

    if message.v != PROTOCOL_VERSION {
        return Err(Error::UnsupportedVersion(message.v));
    }

    let WireMessage {
        access_point,
        device,
        ..
    } = message;

    if access_point.client_id.is_empty() || access_point.client_id.len() > MAX_CLIENT_ID_LEN {
        return Err(Error::Decode(format!(
            "client_id must be 1..={} bytes, got {}",
            MAX_CLIENT_ID_LEN,
            access_point.client_id.len()
        )));
    }
    if device.mac.is_empty() {
        return Err(Error::Decode("missing device mac".into()));
    }

    let access_point = AccessPoint::new(
        access_point.client_id,
        Position::new(access_point.x, access_point.y, access_point.z),
    );
    let mut decoded = Device::new(device.mac, device.name, device.category);
    decoded.distance = device.distance;
    decoded.latest = device.latest;

    Ok((access_point, decoded))
}
