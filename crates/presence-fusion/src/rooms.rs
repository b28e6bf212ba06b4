//! Rooms, groups and room scoring.

use std::cmp::Ordering;

use tracing::warn;

use crate::model::DeviceCategory;

/// A named group of rooms (a floor, a building wing).
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    /// Aggregate across all rooms and access points in the group.
    pub group_total: f64,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_total: 0.0,
        }
    }
}

/// A room, belonging to exactly one group by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub name: String,
    pub group: String,
    /// Calculated during a scan pass.
    pub room_score: f64,
    pub phone_total: f64,
    pub tablet_total: f64,
    pub computer_total: f64,
    pub watch_total: f64,
    pub beacon_total: f64,
}

impl Room {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            room_score: 0.0,
            phone_total: 0.0,
            tablet_total: 0.0,
            computer_total: 0.0,
            watch_total: 0.0,
            beacon_total: 0.0,
        }
    }

    /// Room with a preset score, mostly for reporting tests.
    pub fn with_score(name: impl Into<String>, group: impl Into<String>, room_score: f64) -> Self {
        Self {
            room_score,
            ..Self::new(name, group)
        }
    }

    /// Count a device seen in this room with the given weight.
    pub fn add_observation(&mut self, category: DeviceCategory, weight: f64) {
        self.room_score += weight;
        match category {
            DeviceCategory::Phone => self.phone_total += weight,
            DeviceCategory::Tablet => self.tablet_total += weight,
            DeviceCategory::Computer => self.computer_total += weight,
            DeviceCategory::Watch => self.watch_total += weight,
            DeviceCategory::Beacon => self.beacon_total += weight,
            DeviceCategory::Unknown => {}
        }
    }

    pub fn category_total(&self, category: DeviceCategory) -> f64 {
        match category {
            DeviceCategory::Phone => self.phone_total,
            DeviceCategory::Tablet => self.tablet_total,
            DeviceCategory::Computer => self.computer_total,
            DeviceCategory::Watch => self.watch_total,
            DeviceCategory::Beacon => self.beacon_total,
            DeviceCategory::Unknown => 0.0,
        }
    }

    /// Clear score and totals before a new scan pass.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.name), std::mem::take(&mut self.group));
    }
}

/// Up to `k` rooms by descending `room_score`.
///
/// Ties keep list order. NaN scores sort after every number. The input is not
/// modified.
pub fn top_k(rooms: &[Room], k: usize) -> Vec<&Room> {
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<&Room> = rooms.iter().collect();
    // sort_by is stable, which gives the list-order tie break.
    ranked.sort_by(|a, b| descending(a.room_score, b.room_score));
    ranked.truncate(k);
    ranked
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Recompute each group's total from the scores of its rooms.
pub fn tally_groups(rooms: &[Room], groups: &mut [Group]) {
    for group in groups.iter_mut() {
        group.group_total = 0.0;
    }

    for room in rooms {
        match groups.iter_mut().find(|g| g.name == room.group) {
            Some(group) => group.group_total += room.room_score,
            None => warn!("Room '{}' refers to unknown group '{}'", room.name, room.group),
        }
    }
}
