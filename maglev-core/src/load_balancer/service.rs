//! The servable hashing unit of a group.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use maglev_hash::{hash_bytes, FlowKey};
use tracing::{info, warn};

use crate::config::TableSize;
use crate::domain::destination::{Destination, DestinationId, GroupId};
use crate::error::Result;
use crate::load_balancer::builder::TableBuilder;
use crate::load_balancer::state::MaglevState;

/// Service behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceFlags(u32);

impl ServiceFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Serve from the fallback destination when nothing else is usable.
    pub const FALLBACK: Self = Self(0x0001);

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for ServiceFlags {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl std::ops::BitOr for ServiceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A lock-free published lookup table.
///
/// Readers load the current [`MaglevState`] without taking a lock. A rebuild
/// computes a complete new state off to the side and swaps it in with a single
/// atomic store, so a reader sees either the whole old table or the whole new
/// one. A replaced state is freed once the last reader holding it lets go.
#[derive(Debug)]
pub struct MaglevHashService<T = ()> {
    group_id: GroupId,
    flags: ServiceFlags,
    table_size: TableSize,
    state: ArcSwapOption<MaglevState<T>>,
}

impl<T> MaglevHashService<T> {
    /// A service with no table published yet.
    pub fn new(group_id: GroupId, table_size: TableSize, flags: ServiceFlags) -> Self {
        info!(
            group = %group_id,
            table_size = table_size.get(),
            flags = flags.bits(),
            "Maglev service created"
        );
        Self {
            group_id,
            flags,
            table_size,
            state: ArcSwapOption::empty(),
        }
    }

    /// Owning group.
    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Behaviour flags.
    pub fn flags(&self) -> ServiceFlags {
        self.flags
    }

    /// Size of every table this service publishes.
    pub fn table_size(&self) -> TableSize {
        self.table_size
    }

    /// The current table, held for as long as the caller keeps it.
    pub fn current(&self) -> Option<Arc<MaglevState<T>>> {
        self.state.load_full()
    }

    /// Whether a table is published.
    pub fn is_serving(&self) -> bool {
        self.state.load().is_some()
    }

    /// Destinations of the current table.
    pub fn destinations(&self) -> Vec<Arc<Destination<T>>> {
        self.state
            .load()
            .as_ref()
            .map(|s| s.destinations().to_vec())
            .unwrap_or_default()
    }

    /// Build a table from `destinations` and publish it.
    ///
    /// On failure nothing is published and the previous table keeps serving.
    pub fn rebuild(&self, destinations: &[Arc<Destination<T>>]) -> Result<Arc<MaglevState<T>>> {
        let builder = TableBuilder::new(self.table_size)
            .allow_fallback(self.flags.contains(ServiceFlags::FALLBACK));

        match builder.build(destinations) {
            Ok(state) => {
                info!(
                    group = %self.group_id,
                    table_size = self.table_size.get(),
                    destinations = state.destinations().len(),
                    gcd = state.gcd(),
                    rshift = state.rshift(),
                    fallback = state.is_fallback(),
                    "Built Maglev lookup table"
                );
                state.log_occupancy();
                let state = Arc::new(state);
                self.publish(Arc::clone(&state));
                Ok(state)
            }
            Err(err) => {
                let enabled = destinations.iter().filter(|d| d.is_enabled()).count();
                let idle = destinations.iter().filter(|d| d.weight == 0).count();
                let fallback = destinations.iter().filter(|d| d.fallback).count();
                warn!(
                    group = %self.group_id,
                    total = destinations.len(),
                    enabled,
                    idle,
                    fallback,
                    serving = self.is_serving(),
                    error = %err,
                    "Maglev rebuild failed, keeping previous table"
                );
                Err(err)
            }
        }
    }

    /// Atomically replace the published table. Returns the previous one.
    pub fn publish(&self, state: Arc<MaglevState<T>>) -> Option<Arc<MaglevState<T>>> {
        debug_assert_eq!(state.table_size(), self.table_size);
        self.state.swap(Some(state))
    }

    /// Stop serving. Returns the last published table.
    pub fn retire(&self) -> Option<Arc<MaglevState<T>>> {
        info!(group = %self.group_id, "Maglev service retired");
        self.state.swap(None)
    }

    /// Hash a flow key and resolve it to a destination identifier.
    pub fn lookup(&self, flow_key: &[u8]) -> Option<DestinationId> {
        let hash = hash_bytes(flow_key, 0);
        self.state.load().as_ref().map(|s| s.lookup_hash(hash).id)
    }

    /// Resolve an already computed flow hash.
    pub fn lookup_hash(&self, hash: u32) -> Option<Arc<Destination<T>>> {
        self.state
            .load()
            .as_ref()
            .map(|s| Arc::clone(s.lookup_hash(hash)))
    }

    /// Resolve a datapath flow key.
    pub fn lookup_flow(&self, key: &FlowKey) -> Option<Arc<Destination<T>>> {
        self.lookup_hash(key.hash())
    }
}

/// A shared reference to a service.
pub type SharedService<T = ()> = Arc<MaglevHashService<T>>;
