//! Per-destination slot permutations.
//!
//! A destination visits table slots in the order
//! `(offset + i * skip) mod M`. With `M` prime and `skip` in `[1, M-1]` that
//! sequence touches every slot exactly once before repeating.

use maglev_hash::hash_bytes;

use crate::config::TableSize;
use crate::domain::destination::DestinationId;

/// Hash basis of the offset channel.
pub const OFFSET_BASIS: u32 = 0;
/// Hash basis of the skip channel.
pub const SKIP_BASIS: u32 = 0x9e37_79b9;

/// The cyclic slot order of one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permutation {
    offset: u32,
    skip: u32,
    table_size: u32,
}

impl Permutation {
    /// Derive the permutation of `id` for a table of `table_size` slots.
    pub fn new(id: DestinationId, table_size: TableSize) -> Self {
        let key = id.0.to_le_bytes();
        let m = table_size.get();

        let offset = hash_bytes(&key, OFFSET_BASIS) % m;
        let skip = hash_bytes(&key, SKIP_BASIS) % (m - 1) + 1;

        Self {
            offset,
            skip,
            table_size: m,
        }
    }

    /// First slot of the sequence.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Step between consecutive slots.
    pub fn skip(&self) -> u32 {
        self.skip
    }

    /// The slot following `slot`.
    pub fn next_slot(&self, slot: u32) -> u32 {
        ((u64::from(slot) + u64::from(self.skip)) % u64::from(self.table_size)) as u32
    }
}
