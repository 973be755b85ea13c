//! Concurrent table of all groups.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::config::MaglevConfig;
use crate::domain::destination::{Bucket, Destination, GroupId};
use crate::domain::group::{Group, GroupProps};
use crate::error::Result;
use crate::load_balancer::service::SharedService;
use crate::load_balancer::state::MaglevState;

type ServiceMap<T> = HashMap<GroupId, SharedService<T>>;

/// All groups, keyed by identifier.
///
/// Configuration code constructs, updates and destructs groups through the
/// group map. The lookup path reads a separately published map of service
/// handles, so it never waits on a rebuild, not even one of the group it
/// resolves against.
#[derive(Debug)]
pub struct GroupTable<T = ()> {
    config: MaglevConfig,
    groups: DashMap<GroupId, Group<T>>,
    services: ArcSwap<ServiceMap<T>>,
}

impl<T: Clone> GroupTable<T> {
    /// An empty table.
    pub fn new(config: MaglevConfig) -> Self {
        Self {
            config,
            groups: DashMap::new(),
            services: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Create (or recreate) a group and build its first table.
    ///
    /// A group that fails its first build is still registered, unbuilt, so a
    /// later bucket change can bring it up. An invalid size class registers
    /// nothing.
    pub fn construct(
        &self,
        id: GroupId,
        props: GroupProps,
        buckets: impl IntoIterator<Item = Bucket<T>>,
    ) -> Result<Arc<MaglevState<T>>> {
        let mut group = Group::new(id, props, &self.config.table_sizes, buckets)?;
        let built = group.rebuild();
        let service = group.service();

        // The entry guard orders concurrent constructs and destructs of one id.
        match self.groups.entry(id) {
            Entry::Occupied(mut entry) => {
                self.publish_service(id, Some(service));
                entry.insert(group).retire();
            }
            Entry::Vacant(entry) => {
                self.publish_service(id, Some(service));
                entry.insert(group);
            }
        }
        info!(group = %id, ok = built.is_ok(), "Group constructed");
        built
    }

    /// Retire and remove a group. Returns whether it existed.
    pub fn destruct(&self, id: GroupId) -> bool {
        match self.groups.entry(id) {
            Entry::Occupied(entry) => {
                self.publish_service(id, None);
                entry.remove().retire();
                info!(group = %id, "Group destructed");
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Run a mutation against one group.
    ///
    /// Lookups against the group keep resolving on its current table while
    /// `f` runs.
    pub fn with_group_mut<R>(
        &self,
        id: GroupId,
        f: impl FnOnce(&mut Group<T>) -> R,
    ) -> Option<R> {
        self.groups.get_mut(&id).map(|mut group| f(&mut group))
    }

    fn publish_service(&self, id: GroupId, service: Option<SharedService<T>>) {
        self.services.rcu(|current| {
            let mut next = ServiceMap::clone(current);
            match &service {
                Some(service) => next.insert(id, Arc::clone(service)),
                None => next.remove(&id),
            };
            next
        });
    }
}

impl<T> GroupTable<T> {
    /// The serving unit of a group.
    pub fn service(&self, id: GroupId) -> Option<SharedService<T>> {
        self.services.load().get(&id).cloned()
    }

    /// Resolve a flow hash within a group.
    pub fn lookup(&self, id: GroupId, hash: u32) -> Option<Arc<Destination<T>>> {
        self.service(id)?.lookup_hash(hash)
    }

    /// Configuration the table was created with.
    pub fn config(&self) -> &MaglevConfig {
        &self.config
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Identifiers of all groups, sorted.
    pub fn ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.groups.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }
}

impl<T: Clone> Default for GroupTable<T> {
    fn default() -> Self {
        Self::new(MaglevConfig::default())
    }
}
