//! Destination and bucket models.

use std::fmt;

/// A unique identifier for a destination within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestinationId(pub u32);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `(weight, destination)` pair as supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket<T = ()> {
    /// The destination this bucket resolves to.
    pub id: DestinationId,
    /// Relative weight. Zero keeps the destination registered but idle.
    pub weight: u16,
    /// Caller data attached to the destination.
    pub payload: T,
}

impl Bucket<()> {
    /// A bucket without payload.
    pub fn new(id: u32, weight: u16) -> Self {
        Self {
            id: DestinationId(id),
            weight,
            payload: (),
        }
    }
}

impl<T> Bucket<T> {
    /// A bucket carrying caller data.
    pub fn with_payload(id: u32, weight: u16, payload: T) -> Self {
        Self {
            id: DestinationId(id),
            weight,
            payload,
        }
    }
}

/// One backend a group can send flows to.
///
/// The payload is never inspected by the table builder; it is handed back
/// unchanged on lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination<T = ()> {
    /// Destination identifier, also the permutation seed.
    pub id: DestinationId,
    /// Owning group.
    pub group_id: GroupId,
    /// Current weight. Zero means present but owning no slot.
    pub weight: u32,
    /// Weight before the most recent change.
    pub last_weight: u32,
    /// Excluded from table builds while set.
    pub disabled: bool,
    /// May serve alone when no enabled destination carries weight.
    pub fallback: bool,
    /// Caller data.
    pub payload: T,
}

impl<T> Destination<T> {
    /// A new, enabled destination.
    pub fn new(group_id: GroupId, id: DestinationId, weight: u32, payload: T) -> Self {
        Self {
            id,
            group_id,
            weight,
            last_weight: weight,
            disabled: false,
            fallback: false,
            payload,
        }
    }

    /// Whether the destination takes part in table builds.
    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Record a new weight. Returns whether it differs from the current one.
    pub(crate) fn update_weight(&mut self, weight: u32) -> bool {
        if self.weight == weight {
            return false;
        }
        self.last_weight = self.weight;
        self.weight = weight;
        true
    }
}
