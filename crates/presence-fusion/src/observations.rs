//! Closest-to observation log.
//!
//! Keeps the most recent [`CAPACITY`] distance samples in arrival order and
//! answers "which access point is this device closest to right now".

use std::collections::VecDeque;

use crate::model::{AccessPointId, DeviceId, Timestamp};

/// Number of samples retained.
pub const CAPACITY: usize = 2048;

/// Samples closer than this are sensor noise and never stored.
pub const NOISE_FLOOR: f64 = 0.1;

/// A closer reading from another access point only counts if it is less than
/// this many seconds older than the current best.
pub const FRESHNESS_WINDOW_SECS: i64 = 60;

/// One (device, access point, distance, time) sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub device_id: DeviceId,
    pub access_point_id: AccessPointId,
    pub distance: f64,
    pub time: Timestamp,
}

/// Bounded, append-only log of observations.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    samples: VecDeque<Observation>,
    capacity: usize,
}

impl Default for ObservationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationLog {
    /// Create an empty log holding [`CAPACITY`] samples.
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    /// Create an empty log with a custom bound.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    ///
    /// Returns false when the sample is below the noise floor (or not a
    /// number) and was dropped.
    pub fn record(
        &mut self,
        device_id: DeviceId,
        access_point_id: AccessPointId,
        time: Timestamp,
        distance: f64,
    ) -> bool {
        if !distance.is_finite() || distance < NOISE_FLOOR || self.capacity == 0 {
            return false;
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }

        self.samples.push_back(Observation {
            device_id,
            access_point_id,
            distance,
            time,
        });
        true
    }

    /// Best current observation for a device.
    ///
    /// Walks newest to oldest. The newest sample is the initial best. An older
    /// sample replaces it only when it comes from a different access point,
    /// is strictly closer, and `best.time - sample.time` is under
    /// [`FRESHNESS_WINDOW_SECS`]. A gap of exactly 60s keeps the incumbent.
    /// Negative gaps (skewed clocks) count as fresh. Timestamps come off the
    /// wire unchecked, so the gap saturates instead of overflowing.
    pub fn best_for(&self, device_id: DeviceId) -> Option<Observation> {
        let mut best: Option<Observation> = None;

        for sample in self.samples.iter().rev().filter(|s| s.device_id == device_id) {
            let Some(current) = best else {
                best = Some(*sample);
                continue;
            };

            // Latest hit on an access point is the relevant one.
            if current.access_point_id == sample.access_point_id {
                continue;
            }

            if sample.distance < current.distance
                && current.time.saturating_sub(sample.time) < FRESHNESS_WINDOW_SECS
            {
                best = Some(*sample);
            }
        }

        best
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
