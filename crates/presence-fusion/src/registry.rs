//! Access point registry.
//!
//! Access points are interned by name the first time the mesh hears from
//! them. The registry hands out `Arc` records that never change afterwards,
//! so readers can keep them without holding any lock.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{AccessPoint, AccessPointId};

/// Most distinct access points a single registry will intern.
pub const MAX_ACCESS_POINTS: usize = 256;

#[derive(Debug, Default)]
struct Inner {
    /// Interned records in first-seen order.
    entries: Vec<Arc<AccessPoint>>,
    next_sequence: AccessPointId,
}

/// Name-keyed set of known access points.
#[derive(Debug)]
pub struct AccessPointRegistry {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Default for AccessPointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessPointRegistry {
    /// Create an empty registry with room for [`MAX_ACCESS_POINTS`] entries.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ACCESS_POINTS)
    }

    /// Create an empty registry with a custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity,
        }
    }

    /// Intern `candidate` by `client_id`.
    ///
    /// An existing record always wins over the candidate's id and position.
    /// A new name gets the next sequence id. The lookup and the insert happen
    /// under one write lock, so racing first sights of a name share one id.
    pub fn upsert(&self, candidate: AccessPoint) -> Result<Arc<AccessPoint>> {
        debug!("Check for new access point '{}'", candidate.client_id);

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = inner
            .entries
            .iter()
            .find(|ap| ap.client_id == candidate.client_id)
        {
            return Ok(Arc::clone(existing));
        }

        if inner.entries.len() >= self.capacity {
            return Err(Error::RegistryFull {
                capacity: self.capacity,
            });
        }

        let record = Arc::new(AccessPoint {
            id: inner.next_sequence,
            ..candidate
        });
        inner.next_sequence += 1;
        inner.entries.push(Arc::clone(&record));

        info!("New access point '{}', {} known:", record.client_id, inner.entries.len());
        for ap in &inner.entries {
            info!("  {}", ap);
        }

        Ok(record)
    }

    /// Find an interned access point by its sequence id.
    pub fn lookup_by_id(&self, id: AccessPointId) -> Option<Arc<AccessPoint>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        // Ids are dense and never reused, so the id is the index.
        inner.entries.get(id as usize).filter(|ap| ap.id == id).cloned()
    }

    /// Find an interned access point by name.
    pub fn lookup_by_name(&self, client_id: &str) -> Option<Arc<AccessPoint>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .iter()
            .find(|ap| ap.client_id == client_id)
            .cloned()
    }

    /// All interned access points in id order.
    pub fn snapshot(&self) -> Vec<Arc<AccessPoint>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use proptest::prelude::*;
    use std::thread;

    fn ap(name: &str) -> AccessPoint {
        AccessPoint::new(name, Position::UNKNOWN)
    }

    #[test]
    fn upsert_is_idempotent() {
        let registry = AccessPointRegistry::new();

        let first = registry.upsert(ap("kitchen")).unwrap();
        let second = registry.upsert(ap("kitchen")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn existing_record_wins_over_payload() {
        let registry = AccessPointRegistry::new();
        registry
            .upsert(AccessPoint::new("garage", Position::new(10.0, 0.5, 2.0)))
            .unwrap();

        let mut moved = AccessPoint::new("garage", Position::new(99.0, 99.0, 99.0));
        moved.id = 42;
        let interned = registry.upsert(moved).unwrap();

        assert_eq!(interned.id, 0);
        assert_eq!(interned.position, Position::new(10.0, 0.5, 2.0));
    }

    #[test]
    fn lookup_by_id_and_name() {
        let registry = AccessPointRegistry::new();
        registry.upsert(ap("study")).unwrap();
        registry.upsert(ap("store")).unwrap();

        assert_eq!(registry.lookup_by_id(1).unwrap().client_id, "store");
        assert_eq!(registry.lookup_by_name("study").unwrap().id, 0);
        assert!(registry.lookup_by_id(2).is_none());
        assert!(registry.lookup_by_name("barn").is_none());
    }

    #[test]
    fn full_registry_rejects_new_names() {
        let registry = AccessPointRegistry::with_capacity(2);
        registry.upsert(ap("a")).unwrap();
        registry.upsert(ap("b")).unwrap();

        assert_eq!(
            registry.upsert(ap("c")),
            Err(Error::RegistryFull { capacity: 2 })
        );
        // Known names still resolve once full.
        assert_eq!(registry.upsert(ap("b")).unwrap().id, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn default_capacity_holds_256() {
        let registry = AccessPointRegistry::new();
        for i in 0..MAX_ACCESS_POINTS {
            registry.upsert(ap(&format!("ap-{i}"))).unwrap();
        }
        assert!(matches!(
            registry.upsert(ap("one-too-many")),
            Err(Error::RegistryFull { .. })
        ));
    }

    #[test]
    fn concurrent_first_sight_assigns_one_id() {
        let registry = Arc::new(AccessPointRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.upsert(ap("livingroom")).unwrap().id)
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|&id| id == 0));
        assert_eq!(registry.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_ids_follow_arrival_order(n in 1usize..64, repeats in 1usize..4) {
            let registry = AccessPointRegistry::new();
            for round in 0..repeats {
                for i in 0..n {
                    let interned = registry.upsert(ap(&format!("ap-{i}"))).unwrap();
                    prop_assert_eq!(interned.id as usize, i, "round {}", round);
                }
            }
            prop_assert_eq!(registry.len(), n);
        }
    }
}
