//! The authoritative destination list of a group.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::domain::destination::{Bucket, Destination, DestinationId, GroupId};
use crate::error::{MaglevError, Result};

/// Weighted destinations of one group, ordered by identifier.
///
/// Entries are shared with published snapshots and copied on write, so a
/// table build working from [`snapshot`](Self::snapshot) never observes a
/// later mutation.
#[derive(Debug, Clone)]
pub struct DestinationRegistry<T = ()> {
    group_id: GroupId,
    destinations: BTreeMap<DestinationId, Arc<Destination<T>>>,
}

impl<T: Clone> DestinationRegistry<T> {
    /// An empty registry for a group.
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            destinations: BTreeMap::new(),
        }
    }

    /// Register a bucket, or update the weight and payload of an existing one.
    ///
    /// Returns whether the destination is new or its weight changed.
    pub fn add_or_update(&mut self, bucket: Bucket<T>) -> bool {
        let Bucket {
            id,
            weight,
            payload,
        } = bucket;
        let weight = u32::from(weight);

        match self.destinations.get_mut(&id) {
            Some(existing) => {
                let dest = Arc::make_mut(existing);
                let old = dest.weight;
                let changed = dest.update_weight(weight);
                dest.payload = payload;
                if changed {
                    info!(
                        group = %self.group_id,
                        dest = %id,
                        old,
                        weight,
                        "Destination weight changed"
                    );
                }
                changed
            }
            None => {
                info!(group = %self.group_id, dest = %id, weight, "Destination added");
                self.destinations.insert(
                    id,
                    Arc::new(Destination::new(self.group_id, id, weight, payload)),
                );
                true
            }
        }
    }

    /// Remove a destination.
    pub fn remove(&mut self, id: DestinationId) -> Result<Arc<Destination<T>>> {
        let removed = self
            .destinations
            .remove(&id)
            .ok_or(MaglevError::UnknownDestination(id))?;
        info!(group = %self.group_id, dest = %id, weight = removed.weight, "Destination removed");
        Ok(removed)
    }

    /// Change a destination's weight. Returns whether it changed.
    pub fn set_weight(&mut self, id: DestinationId, weight: u32) -> Result<bool> {
        let group_id = self.group_id;
        let dest = self.get_mut(id)?;
        let old = dest.weight;
        let changed = dest.update_weight(weight);
        if changed {
            info!(group = %group_id, dest = %id, old, weight, "Destination weight changed");
        }
        Ok(changed)
    }

    /// Enable or disable a destination. Returns whether it changed.
    pub fn set_disabled(&mut self, id: DestinationId, disabled: bool) -> Result<bool> {
        let group_id = self.group_id;
        let dest = self.get_mut(id)?;
        if dest.disabled == disabled {
            return Ok(false);
        }
        dest.disabled = disabled;
        info!(group = %group_id, dest = %id, disabled, "Destination availability changed");
        Ok(true)
    }

    /// Mark or unmark a destination as fallback. Returns whether it changed.
    pub fn set_fallback(&mut self, id: DestinationId, fallback: bool) -> Result<bool> {
        let dest = self.get_mut(id)?;
        if dest.fallback == fallback {
            return Ok(false);
        }
        dest.fallback = fallback;
        Ok(true)
    }

    /// Drop every destination not named in `keep`.
    pub fn retain(&mut self, keep: &[DestinationId]) -> usize {
        let before = self.destinations.len();
        self.destinations.retain(|id, _| keep.contains(id));
        before - self.destinations.len()
    }

    /// Look up a destination.
    pub fn get(&self, id: DestinationId) -> Option<&Arc<Destination<T>>> {
        self.destinations.get(&id)
    }

    /// A consistent copy of the destination list, ordered by identifier.
    pub fn snapshot(&self) -> Vec<Arc<Destination<T>>> {
        self.destinations.values().cloned().collect()
    }

    /// Owning group.
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Number of registered destinations.
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// Whether no destination is registered.
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    fn get_mut(&mut self, id: DestinationId) -> Result<&mut Destination<T>> {
        self.destinations
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or(MaglevError::UnknownDestination(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DestinationRegistry {
        let mut reg = DestinationRegistry::new(GroupId(1));
        for (id, weight) in [(3, 1), (1, 2), (2, 1)] {
            assert!(reg.add_or_update(Bucket::new(id, weight)));
        }
        reg
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let ids: Vec<_> = registry().snapshot().iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn readding_with_same_weight_is_not_a_change() {
        let mut reg = registry();
        assert!(!reg.add_or_update(Bucket::new(1, 2)));
        assert!(reg.add_or_update(Bucket::new(1, 5)));
        let dest = reg.get(DestinationId(1)).unwrap();
        assert_eq!((dest.weight, dest.last_weight), (5, 2));
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutations() {
        let mut reg = registry();
        let before = reg.snapshot();

        reg.set_weight(DestinationId(1), 0).unwrap();
        reg.set_disabled(DestinationId(2), true).unwrap();
        reg.remove(DestinationId(3)).unwrap();

        assert_eq!(before.len(), 3);
        assert_eq!(before[0].weight, 2);
        assert!(before[1].is_enabled());

        let after = reg.snapshot();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].weight, 0);
        assert!(!after[1].is_enabled());
    }

    #[test]
    fn unknown_destination_is_an_error() {
        let mut reg = registry();
        let missing = DestinationId(42);
        assert_eq!(reg.set_weight(missing, 1), Err(MaglevError::UnknownDestination(missing)));
        assert_eq!(
            reg.set_disabled(missing, true),
            Err(MaglevError::UnknownDestination(missing))
        );
        assert!(reg.remove(missing).is_err());
    }

    #[test]
    fn flag_setters_report_changes() {
        let mut reg = registry();
        assert!(reg.set_fallback(DestinationId(2), true).unwrap());
        assert!(!reg.set_fallback(DestinationId(2), true).unwrap());
        assert!(!reg.set_disabled(DestinationId(2), false).unwrap());
        assert!(reg.get(DestinationId(2)).unwrap().fallback);
    }

    #[test]
    fn retain_drops_unlisted() {
        let mut reg = registry();
        assert_eq!(reg.retain(&[DestinationId(2)]), 2);
        assert_eq!(reg.len(), 1);
    }
}
