//! Error types for table building and group management.

use crate::domain::destination::{DestinationId, GroupId};

/// Errors raised while resolving table sizes or rebuilding a lookup table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaglevError {
    /// No enabled destination carries weight and no fallback destination is
    /// available. The previously published table, if any, keeps serving.
    #[error("no enabled destination and no fallback destination")]
    EmptyDestinationSet,

    /// A table size class outside the configured prime table.
    #[error("table size index {index} out of range ({available} sizes configured)")]
    InvalidTableSize {
        /// Requested size class.
        index: usize,
        /// Number of configured sizes.
        available: usize,
    },

    /// A configured table size that is not a prime.
    #[error("table size {0} is not prime")]
    NotPrime(u32),

    /// More destinations than the table has slots.
    #[error("{count} destinations do not fit in a table of {table_size} slots")]
    TooManyDestinations {
        /// Destinations taking part in the build.
        count: usize,
        /// Slots in the table.
        table_size: u32,
    },

    /// The destination is not registered in the group.
    #[error("unknown destination {0}")]
    UnknownDestination(DestinationId),

    /// The group was deleted and no longer accepts changes.
    #[error("group {0} has been retired")]
    Retired(GroupId),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MaglevError>;
