//! Built lookup tables.

use std::sync::Arc;

use maglev_hash::hash_bytes;
use tracing::debug;

use crate::config::TableSize;
use crate::domain::destination::{Destination, DestinationId};
use crate::load_balancer::builder::MaglevDestSetup;

/// An immutable, fully populated lookup table.
///
/// Every slot refers to one of the destinations that took part in the build.
/// A state is never modified after it is built; rebuilding produces a new one.
#[derive(Debug)]
pub struct MaglevState<T = ()> {
    lookup: Box<[u32]>,
    table_size: TableSize,
    destinations: Vec<Arc<Destination<T>>>,
    dest_setup: Vec<MaglevDestSetup>,
    gcd: u32,
    rshift: u32,
    fallback: bool,
}

impl<T> MaglevState<T> {
    pub(crate) fn new(
        lookup: Box<[u32]>,
        table_size: TableSize,
        destinations: Vec<Arc<Destination<T>>>,
        dest_setup: Vec<MaglevDestSetup>,
        gcd: u32,
        rshift: u32,
        fallback: bool,
    ) -> Self {
        debug_assert_eq!(lookup.len(), table_size.as_usize());
        debug_assert_eq!(destinations.len(), dest_setup.len());
        Self {
            lookup,
            table_size,
            destinations,
            dest_setup,
            gcd,
            rshift,
            fallback,
        }
    }

    /// Number of slots.
    pub fn table_size(&self) -> TableSize {
        self.table_size
    }

    /// The destination owning `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not below the table size.
    pub fn slot(&self, slot: usize) -> &Arc<Destination<T>> {
        &self.destinations[self.lookup[slot] as usize]
    }

    /// Resolve an already computed flow hash.
    pub fn lookup_hash(&self, hash: u32) -> &Arc<Destination<T>> {
        self.slot((hash % self.table_size.get()) as usize)
    }

    /// Hash a flow key and resolve it.
    pub fn lookup(&self, flow_key: &[u8]) -> &Arc<Destination<T>> {
        self.lookup_hash(hash_bytes(flow_key, 0))
    }

    /// Destinations that took part in the build, in build order.
    pub fn destinations(&self) -> &[Arc<Destination<T>>] {
        &self.destinations
    }

    /// Permutation parameters and claim counters recorded by the build,
    /// parallel to [`destinations`](Self::destinations).
    pub fn dest_setup(&self) -> &[MaglevDestSetup] {
        &self.dest_setup
    }

    /// Greatest common divisor of the non-zero weights.
    pub fn gcd(&self) -> u32 {
        self.gcd
    }

    /// Right shift applied to normalized weights.
    pub fn rshift(&self) -> u32 {
        self.rshift
    }

    /// Whether the table was built from the fallback destination alone.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Destination identifier of every slot, in slot order.
    pub fn slot_ids(&self) -> impl Iterator<Item = DestinationId> + '_ {
        self.lookup
            .iter()
            .map(move |&idx| self.destinations[idx as usize].id)
    }

    /// How many slots each destination owns, in build order.
    pub fn slot_counts(&self) -> Vec<(DestinationId, usize)> {
        let mut counts = vec![0usize; self.destinations.len()];
        for &idx in self.lookup.iter() {
            counts[idx as usize] += 1;
        }
        self.destinations
            .iter()
            .map(|d| d.id)
            .zip(counts)
            .collect()
    }

    /// Slots owned by one destination.
    pub fn slots_of(&self, id: DestinationId) -> usize {
        self.slot_counts()
            .into_iter()
            .find(|(d, _)| *d == id)
            .map_or(0, |(_, n)| n)
    }

    pub(crate) fn log_occupancy(&self) {
        for ((id, slots), dest) in self.slot_counts().into_iter().zip(&self.destinations) {
            debug!(
                group = %dest.group_id,
                dest = %id,
                weight = dest.weight,
                slots,
                "Maglev destination occupancy"
            );
        }
    }
}
