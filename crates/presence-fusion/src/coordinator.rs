//! Fusion coordinator.
//!
//! Applies one received (access point, device) observation to the shared
//! state: intern the access point, merge the device record, log the sample,
//! then re-evaluate which access point the device is closest to.
//!
//! Registry, device table and log each sit behind their own lock, held for a
//! single upsert, merge or append. Reporting code can read from any thread
//! while the mesh listener writes.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::devices::{DeviceMerge, DeviceTable, LatestWins};
use crate::error::{Error, Result};
use crate::model::{unix_now, AccessPoint, Device, DeviceId};
use crate::observations::{Observation, ObservationLog};
use crate::registry::AccessPointRegistry;

/// Coordinator configuration.
#[derive(Debug, Clone, Default)]
pub struct FusionConfig {
    /// This node's own access point name.
    pub client_id: Option<String>,
    /// Drop messages that carry our own `client_id` (our broadcasts looping back).
    pub ignore_self: bool,
}

/// The access point a device is currently judged closest to.
#[derive(Debug, Clone, PartialEq)]
pub struct Closest {
    pub observation: Observation,
    pub access_point: Arc<AccessPoint>,
}

/// Entry point for observations received from the mesh.
pub struct FusionCoordinator {
    config: FusionConfig,
    registry: AccessPointRegistry,
    devices: RwLock<DeviceTable>,
    observations: RwLock<ObservationLog>,
    merge: Box<dyn DeviceMerge>,
}

impl Default for FusionCoordinator {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl std::fmt::Debug for FusionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionCoordinator")
            .field("config", &self.config)
            .field("access_points", &self.registry.len())
            .field("observations", &self.observation_count())
            .finish()
    }
}

impl FusionCoordinator {
    /// Create a coordinator using the [`LatestWins`] merge policy.
    pub fn new(config: FusionConfig) -> Self {
        Self::with_merge(config, LatestWins)
    }

    /// Create a coordinator with a custom merge policy.
    pub fn with_merge(config: FusionConfig, merge: impl DeviceMerge + 'static) -> Self {
        Self {
            config,
            registry: AccessPointRegistry::new(),
            devices: RwLock::new(DeviceTable::new()),
            observations: RwLock::new(ObservationLog::new()),
            merge: Box::new(merge),
        }
    }

    /// Use a pre-built registry (e.g. with a different capacity).
    #[must_use]
    pub fn with_registry(mut self, registry: AccessPointRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a device so observations of it are fused.
    pub fn provision_device(&self, device: Device) -> DeviceId {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .provision(device)
    }

    /// Fuse one observation received from the mesh.
    ///
    /// Returns the device's closest access point after the sample is logged,
    /// or `None` if the message was dropped as our own echo or the sample had
    /// no usable history.
    pub fn on_message(&self, raw_ap: AccessPoint, raw_device: Device) -> Result<Option<Closest>> {
        if self.is_own_echo(&raw_ap) {
            debug!("Ignoring message from self {} : {}", raw_ap.client_id, raw_device.mac);
            return Ok(None);
        }

        let ap = self.registry.upsert(raw_ap)?;

        let device_id = {
            let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
            let existing = devices
                .get_mut(&raw_device.mac)
                .ok_or_else(|| Error::UnknownDevice(raw_device.mac.clone()))?;
            debug!(
                "{} '{}' from '{}' dt={}s",
                raw_device.mac,
                raw_device.name,
                ap.client_id,
                unix_now().saturating_sub(raw_device.latest)
            );
            self.merge.merge(existing, &raw_device);
            // Local id, never the sender's.
            existing.id
        };

        self.observations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(device_id, ap.id, raw_device.latest, raw_device.distance);

        let closest = self.closest_by_id(device_id);
        if let Some(closest) = &closest {
            debug!(
                "{} closest overall is '{}' at {:.2}m",
                raw_device.mac, closest.access_point.client_id, closest.observation.distance
            );
        }
        Ok(closest)
    }

    /// Best current observation for a device id.
    pub fn best_for(&self, device_id: DeviceId) -> Option<Observation> {
        self.observations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .best_for(device_id)
    }

    /// Closest access point for a device id, resolved against the registry.
    pub fn closest_by_id(&self, device_id: DeviceId) -> Option<Closest> {
        let observation = self.best_for(device_id)?;
        let access_point = self.registry.lookup_by_id(observation.access_point_id)?;
        Some(Closest {
            observation,
            access_point,
        })
    }

    /// Closest access point for a device by MAC.
    pub fn closest_for(&self, mac: &str) -> Option<Closest> {
        let id = self.device(mac)?.id;
        self.closest_by_id(id)
    }

    /// Snapshot of a device record.
    pub fn device(&self, mac: &str) -> Option<Device> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mac)
            .cloned()
    }

    /// Snapshot of all provisioned devices.
    pub fn devices(&self) -> Vec<Device> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// All access points heard from so far.
    pub fn access_points(&self) -> Vec<Arc<AccessPoint>> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &AccessPointRegistry {
        &self.registry
    }

    pub fn observation_count(&self) -> usize {
        self.observations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    fn is_own_echo(&self, ap: &AccessPoint) -> bool {
        self.config.ignore_self
            && self
                .config
                .client_id
                .as_deref()
                .is_some_and(|own| own == ap.client_id)
    }
}
