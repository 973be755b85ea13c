//! Groups bind a bucket list to one hashing service.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{TableSize, TableSizes, DEFAULT_SIZE_INDEX};
use crate::domain::destination::{Bucket, Destination, DestinationId, GroupId};
use crate::domain::registry::DestinationRegistry;
use crate::error::{MaglevError, Result};
use crate::load_balancer::service::{MaglevHashService, ServiceFlags, SharedService};
use crate::load_balancer::state::MaglevState;

/// Selection settings of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupProps {
    /// Selection method identifier, carried for the datapath.
    pub selection_method: u32,
    /// Hash algorithm field. Selects the table size class.
    pub hash_alg: u32,
    /// Hash basis, carried for the datapath.
    pub hash_basis: u32,
    /// Hash mask, carried for the datapath.
    pub hash_mask: u32,
    /// Serve from a fallback destination when nothing else is usable.
    pub fallback: bool,
}

impl Default for GroupProps {
    fn default() -> Self {
        Self {
            selection_method: 0,
            hash_alg: DEFAULT_SIZE_INDEX as u32,
            hash_basis: 0,
            hash_mask: 0,
            fallback: true,
        }
    }
}

impl GroupProps {
    /// Default settings with the given table size class.
    pub fn with_size_index(index: u32) -> Self {
        Self {
            hash_alg: index,
            ..Self::default()
        }
    }
}

/// Lifecycle of a group's lookup table.
///
/// `Building` and `Rebuilding` only exist while a rebuild runs; outside of
/// one a live group is either `Unbuilt` or `Served`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// No table has been built successfully yet.
    Unbuilt,
    /// First build in progress.
    Building,
    /// A table is published.
    Served,
    /// A replacement table is being built while the old one serves.
    Rebuilding,
    /// The group was deleted.
    Retired,
}

/// A bucket list and the service publishing its lookup table.
///
/// Every change to the bucket list triggers a full rebuild; setting a weight
/// or flag to its current value does not. A failed rebuild leaves the
/// previously published table in place.
#[derive(Debug)]
pub struct Group<T = ()> {
    id: GroupId,
    props: GroupProps,
    registry: DestinationRegistry<T>,
    service: SharedService<T>,
    state: GroupState,
}

impl<T: Clone> Group<T> {
    /// Create an unbuilt group.
    ///
    /// Fails with [`MaglevError::InvalidTableSize`] if `props.hash_alg` is not
    /// a configured size class.
    pub fn new(
        id: GroupId,
        props: GroupProps,
        sizes: &TableSizes,
        buckets: impl IntoIterator<Item = Bucket<T>>,
    ) -> Result<Self> {
        let table_size = sizes.get(props.hash_alg as usize)?;
        let flags = if props.fallback {
            ServiceFlags::FALLBACK
        } else {
            ServiceFlags::NONE
        };

        let mut registry = DestinationRegistry::new(id);
        for bucket in buckets {
            registry.add_or_update(bucket);
        }

        info!(
            group = %id,
            table_size = table_size.get(),
            size_index = props.hash_alg,
            "Group created"
        );

        Ok(Self {
            id,
            props,
            registry,
            service: Arc::new(MaglevHashService::new(id, table_size, flags)),
            state: GroupState::Unbuilt,
        })
    }

    /// Rebuild the lookup table from the current bucket list and publish it.
    pub fn rebuild(&mut self) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;

        let serving = self.state == GroupState::Served;
        self.state = if serving {
            GroupState::Rebuilding
        } else {
            GroupState::Building
        };

        let snapshot = self.registry.snapshot();
        info!(
            group = %self.id,
            table_size = self.table_size().get(),
            destinations = snapshot.len(),
            "Building Maglev lookup table"
        );

        let result = self.service.rebuild(&snapshot);
        self.state = match (&result, serving) {
            (Ok(_), _) | (Err(_), true) => GroupState::Served,
            (Err(_), false) => GroupState::Unbuilt,
        };
        result
    }

    /// Add a bucket, or update an existing bucket's weight and payload.
    pub fn add_bucket(&mut self, bucket: Bucket<T>) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;
        self.registry.add_or_update(bucket);
        self.rebuild()
    }

    /// Remove a bucket.
    pub fn remove_bucket(&mut self, id: DestinationId) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;
        self.registry.remove(id)?;
        self.rebuild()
    }

    /// Change a bucket's weight.
    pub fn set_weight(&mut self, id: DestinationId, weight: u32) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;
        let changed = self.registry.set_weight(id, weight)?;
        self.rebuild_if(changed)
    }

    /// Enable or disable a bucket.
    pub fn set_disabled(
        &mut self,
        id: DestinationId,
        disabled: bool,
    ) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;
        let changed = self.registry.set_disabled(id, disabled)?;
        self.rebuild_if(changed)
    }

    /// Mark or unmark a bucket as the fallback destination.
    pub fn set_fallback(
        &mut self,
        id: DestinationId,
        fallback: bool,
    ) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;
        let changed = self.registry.set_fallback(id, fallback)?;
        self.rebuild_if(changed)
    }

    /// Replace the whole bucket list with one rebuild.
    ///
    /// Buckets that stay keep their flags.
    pub fn replace_buckets(
        &mut self,
        buckets: impl IntoIterator<Item = Bucket<T>>,
    ) -> Result<Arc<MaglevState<T>>> {
        self.ensure_live()?;
        let buckets: Vec<Bucket<T>> = buckets.into_iter().collect();
        let keep: Vec<DestinationId> = buckets.iter().map(|b| b.id).collect();
        self.registry.retain(&keep);
        for bucket in buckets {
            self.registry.add_or_update(bucket);
        }
        self.rebuild()
    }

    /// Stop serving and refuse further changes.
    ///
    /// Readers already holding the service or a table keep them until they
    /// drop their handles.
    pub fn retire(&mut self) {
        if self.state == GroupState::Retired {
            return;
        }
        self.service.retire();
        self.state = GroupState::Retired;
        info!(group = %self.id, "Group retired");
    }

    // A served group whose bucket list did not change keeps its table.
    fn rebuild_if(&mut self, changed: bool) -> Result<Arc<MaglevState<T>>> {
        if !changed && self.state == GroupState::Served {
            if let Some(current) = self.service.current() {
                debug!(group = %self.id, "Bucket list unchanged, keeping current table");
                return Ok(current);
            }
        }
        self.rebuild()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == GroupState::Retired {
            return Err(MaglevError::Retired(self.id));
        }
        Ok(())
    }
}

impl<T> Group<T> {
    /// Group identifier.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Selection settings.
    pub fn props(&self) -> &GroupProps {
        &self.props
    }

    /// Lifecycle state.
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Table size of this group.
    pub fn table_size(&self) -> TableSize {
        self.service.table_size()
    }

    /// The authoritative bucket list.
    pub fn registry(&self) -> &DestinationRegistry<T> {
        &self.registry
    }

    /// A handle to the serving unit, for readers.
    pub fn service(&self) -> SharedService<T> {
        Arc::clone(&self.service)
    }

    /// Hash a flow key and resolve it to a destination identifier.
    pub fn lookup(&self, flow_key: &[u8]) -> Option<DestinationId> {
        self.service.lookup(flow_key)
    }

    /// Resolve an already computed flow hash.
    pub fn lookup_hash(&self, hash: u32) -> Option<Arc<Destination<T>>> {
        self.service.lookup_hash(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(buckets: Vec<Bucket>) -> Group {
        Group::new(
            GroupId(7),
            GroupProps::with_size_index(1),
            &TableSizes::default(),
            buckets,
        )
        .unwrap()
    }

    #[test]
    fn unknown_size_class_is_rejected_before_build() {
        let err = Group::new(
            GroupId(1),
            GroupProps::with_size_index(11),
            &TableSizes::default(),
            vec![Bucket::new(1, 1)],
        )
        .unwrap_err();
        assert_eq!(err, MaglevError::InvalidTableSize { index: 11, available: 11 });
    }

    #[test]
    fn lifecycle() {
        let mut g = group(vec![Bucket::new(1, 1), Bucket::new(2, 1)]);
        assert_eq!(g.state(), GroupState::Unbuilt);
        assert_eq!(g.lookup(b"flow"), None);

        g.rebuild().unwrap();
        assert_eq!(g.state(), GroupState::Served);
        assert!(g.lookup(b"flow").is_some());

        g.add_bucket(Bucket::new(3, 1)).unwrap();
        assert_eq!(g.state(), GroupState::Served);

        g.retire();
        assert_eq!(g.state(), GroupState::Retired);
        assert_eq!(g.lookup(b"flow"), None);
        assert_eq!(g.rebuild().unwrap_err(), MaglevError::Retired(GroupId(7)));
        assert_eq!(
            g.add_bucket(Bucket::new(4, 1)).unwrap_err(),
            MaglevError::Retired(GroupId(7))
        );
    }

    #[test]
    fn failed_first_build_stays_unbuilt() {
        let mut g = group(vec![Bucket::new(1, 0)]);
        assert_eq!(g.rebuild().unwrap_err(), MaglevError::EmptyDestinationSet);
        assert_eq!(g.state(), GroupState::Unbuilt);
        assert!(!g.service().is_serving());
    }

    #[test]
    fn disabling_everything_keeps_old_table() {
        let mut g = group(vec![Bucket::new(1, 1), Bucket::new(2, 1)]);
        let served = g.rebuild().unwrap();

        g.set_disabled(DestinationId(1), true).unwrap();
        let err = g.set_disabled(DestinationId(2), true).unwrap_err();
        assert_eq!(err, MaglevError::EmptyDestinationSet);

        assert_eq!(g.state(), GroupState::Served);
        let current = g.service().current().unwrap();
        assert!(!Arc::ptr_eq(&served, &current));
        assert!(current.slot_ids().all(|id| id == DestinationId(2)));
        assert_eq!(g.lookup(b"any flow"), Some(DestinationId(2)));
    }

    #[test]
    fn weight_to_zero_keeps_destination_registered() {
        let mut g = group(vec![Bucket::new(1, 1), Bucket::new(2, 1), Bucket::new(3, 1)]);
        g.rebuild().unwrap();

        let state = g.set_weight(DestinationId(2), 0).unwrap();
        assert_eq!(state.slots_of(DestinationId(2)), 0);
        assert!(state.destinations().iter().any(|d| d.id == DestinationId(2)));

        let dest = g.registry().get(DestinationId(2)).unwrap();
        assert_eq!((dest.weight, dest.last_weight), (0, 1));
    }

    #[test]
    fn fallback_takes_over_when_all_disabled() {
        let mut g = group(vec![Bucket::new(1, 1), Bucket::new(2, 1)]);
        g.rebuild().unwrap();
        g.set_fallback(DestinationId(2), true).unwrap();
        g.set_disabled(DestinationId(1), true).unwrap();
        let state = g.set_disabled(DestinationId(2), true).unwrap();
        assert!(state.is_fallback());
        assert_eq!(g.lookup(b"flow"), Some(DestinationId(2)));
    }

    #[test]
    fn replace_buckets_rebuilds_once_with_new_set() {
        let mut g = group(vec![Bucket::new(1, 1), Bucket::new(2, 1)]);
        g.rebuild().unwrap();
        g.set_disabled(DestinationId(2), true).unwrap();

        let state = g
            .replace_buckets(vec![Bucket::new(2, 3), Bucket::new(5, 1)])
            .unwrap();
        let ids: Vec<u32> = g.registry().snapshot().iter().map(|d| d.id.0).collect();
        assert_eq!(ids, vec![2, 5]);
        // Bucket 2 kept its disabled flag.
        assert!(state.slot_ids().all(|id| id == DestinationId(5)));
    }

    #[test]
    fn mutation_of_unknown_bucket_does_not_rebuild() {
        let mut g = group(vec![Bucket::new(1, 1)]);
        let served = g.rebuild().unwrap();
        assert_eq!(
            g.remove_bucket(DestinationId(9)).unwrap_err(),
            MaglevError::UnknownDestination(DestinationId(9))
        );
        assert!(Arc::ptr_eq(&served, &g.service().current().unwrap()));
    }

    #[test]
    fn unchanged_setting_keeps_current_table() {
        let mut g = group(vec![Bucket::new(1, 1), Bucket::new(2, 1)]);
        let served = g.rebuild().unwrap();

        let same = g.set_weight(DestinationId(1), 1).unwrap();
        assert!(Arc::ptr_eq(&served, &same));
        let same = g.set_disabled(DestinationId(2), false).unwrap();
        assert!(Arc::ptr_eq(&served, &same));

        let reweighted = g.set_weight(DestinationId(1), 4).unwrap();
        assert!(!Arc::ptr_eq(&served, &reweighted));
        assert!(Arc::ptr_eq(&reweighted, &g.service().current().unwrap()));
    }

    #[test]
    fn unchanged_setting_still_builds_an_unbuilt_group() {
        let mut g = group(vec![Bucket::new(1, 1)]);
        assert_eq!(g.state(), GroupState::Unbuilt);
        g.set_fallback(DestinationId(1), false).unwrap();
        assert_eq!(g.state(), GroupState::Served);
    }
}
