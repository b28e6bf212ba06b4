//! Presence Fusion - closest access point tracking for the presence mesh
//!
//! Every access point in the mesh senses nearby devices and broadcasts what it
//! saw. This crate fuses those observations into a local view of which access
//! point each device is currently closest to.
//!
//! # Overview
//!
//! - [`AccessPointRegistry`]: name-keyed set of known access points with stable sequence ids
//! - [`ObservationLog`]: bounded log of distance samples and the closest-access-point query
//! - [`DeviceTable`]: pre-provisioned devices, updated through a [`DeviceMerge`] policy
//! - [`FusionCoordinator`]: applies one received observation to all of the above
//! - [`top_k`]: highest scoring rooms for reporting
//!
//! # Closest-To Policy
//!
//! A device only moves to a different access point when a fresh observation
//! from that access point reports a strictly shorter distance:
//!
//! ```text
//! newest sample               -> initial best
//! older sample, same AP       -> skipped
//! older sample, closer, <60s  -> new best
//! older sample, otherwise     -> ignored
//! ```
//!
//! # Example
//!
//! ```
//! use presence_fusion::{AccessPoint, Device, DeviceCategory, FusionCoordinator, Position};
//!
//! let fusion = FusionCoordinator::default();
//! fusion.provision_device(Device::new("aa:bb:cc:dd:ee:ff", "phone", DeviceCategory::Phone));
//!
//! let mut seen = Device::new("aa:bb:cc:dd:ee:ff", "phone", DeviceCategory::Phone);
//! seen.distance = 2.5;
//! seen.latest = 1_700_000_000;
//!
//! let closest = fusion
//!     .on_message(AccessPoint::new("kitchen", Position::UNKNOWN), seen)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(closest.access_point.client_id, "kitchen");
//! ```

mod coordinator;
mod devices;
mod error;
mod model;
mod observations;
mod registry;
mod rooms;

pub use coordinator::{Closest, FusionConfig, FusionCoordinator};
pub use devices::{DeviceMerge, DeviceTable, LatestWins};
pub use error::{Error, Result};
pub use model::{
    parse_mac64, unix_now, AccessPoint, AccessPointId, Beacon, BeaconSet, Device, DeviceCategory, DeviceId,
    Position, Timestamp, MAX_CLIENT_ID_LEN,
};
pub use observations::{Observation, ObservationLog, CAPACITY, FRESHNESS_WINDOW_SECS, NOISE_FLOOR};
pub use registry::{AccessPointRegistry, MAX_ACCESS_POINTS};
pub use rooms::{tally_groups, top_k, Group, Room};
