//! Table size configuration.
//!
//! Lookup tables are always a prime number of slots, picked by index from an
//! ascending table of primes. The table is an explicit value handed to whoever
//! builds groups, so tests and small deployments can supply their own sizes.

use serde::Deserialize;

use crate::error::{MaglevError, Result};

/// Default prime table sizes, indexed by size class.
///
/// Index 0 is only useful for debugging.
pub const DEFAULT_TABLE_SIZE_PRIMES: [u32; 11] = [
    11, 251, 509, 1021, 2039, 4093, 8191, 16381, 32749, 65521, 131071,
];

/// Default size class (4093 slots).
pub const DEFAULT_SIZE_INDEX: usize = 5;

/// A validated, prime lookup table size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableSize(u32);

impl TableSize {
    /// Validate a table size.
    pub fn new(slots: u32) -> Result<Self> {
        if is_prime(slots) {
            Ok(Self(slots))
        } else {
            Err(MaglevError::NotPrime(slots))
        }
    }

    /// Number of slots.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Number of slots as an index bound.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u32> for TableSize {
    type Error = MaglevError;

    fn try_from(slots: u32) -> Result<Self> {
        Self::new(slots)
    }
}

/// The ascending table of allowed sizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<u32>")]
pub struct TableSizes(Vec<TableSize>);

impl TableSizes {
    /// Validate a list of primes.
    pub fn new(primes: Vec<u32>) -> Result<Self> {
        primes
            .into_iter()
            .map(TableSize::new)
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Resolve a size class to a table size.
    pub fn get(&self, index: usize) -> Result<TableSize> {
        self.0
            .get(index)
            .copied()
            .ok_or(MaglevError::InvalidTableSize {
                index,
                available: self.0.len(),
            })
    }

    /// Number of size classes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no size class is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate the sizes in ascending class order.
    pub fn iter(&self) -> impl Iterator<Item = TableSize> + '_ {
        self.0.iter().copied()
    }
}

impl Default for TableSizes {
    fn default() -> Self {
        Self(DEFAULT_TABLE_SIZE_PRIMES.iter().map(|&p| TableSize(p)).collect())
    }
}

impl TryFrom<Vec<u32>> for TableSizes {
    type Error = MaglevError;

    fn try_from(primes: Vec<u32>) -> Result<Self> {
        Self::new(primes)
    }
}

/// Maglev settings a host process loads from its config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MaglevConfig {
    /// Allowed table sizes.
    pub table_sizes: TableSizes,
    /// Size class used when a group does not pick one.
    pub default_size_index: usize,
}

impl Default for MaglevConfig {
    fn default() -> Self {
        Self {
            table_sizes: TableSizes::default(),
            default_size_index: DEFAULT_SIZE_INDEX,
        }
    }
}

impl MaglevConfig {
    /// Resolve a size class.
    pub fn table_size(&self, index: usize) -> Result<TableSize> {
        self.table_sizes.get(index)
    }

    /// The table size of the default class.
    pub fn default_table_size(&self) -> Result<TableSize> {
        self.table_sizes.get(self.default_size_index)
    }
}

fn is_prime(n: u32) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let n = n as u64;
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
