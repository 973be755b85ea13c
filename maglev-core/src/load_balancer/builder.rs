//! Weighted Maglev table population.
//!
//! Destinations take turns claiming slots along their own permutation. On
//! each round a destination claims as many slots as its weight allows, after
//! the weights have been divided by their greatest common divisor and, when
//! the largest of them is big relative to the table, shifted right so that
//! no destination dominates the early rounds.
//!
//! Reference: "Maglev: A Fast and Reliable Software Network Load Balancer",
//! section 3.4.

use std::sync::Arc;

use tracing::warn;

use crate::config::TableSize;
use crate::domain::destination::Destination;
use crate::error::{MaglevError, Result};
use crate::load_balancer::permutation::Permutation;
use crate::load_balancer::state::MaglevState;

const EMPTY: u32 = u32::MAX;

/// Per-destination state of one build.
///
/// Created fresh by every build and never carried into the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaglevDestSetup {
    /// First slot of the destination's permutation.
    pub offset: u32,
    /// Permutation step, in `[1, M-1]`.
    pub skip: u32,
    /// Permutation cursor: the next slot this destination will try.
    pub perm: u32,
    /// Slots claimed per round.
    pub turns: u32,
    /// Slots claimed so far.
    pub claimed: u32,
}

/// Builds lookup tables of one size.
#[derive(Debug, Clone, Copy)]
pub struct TableBuilder {
    table_size: TableSize,
    allow_fallback: bool,
}

impl TableBuilder {
    /// A builder for tables of `table_size` slots, fallback allowed.
    pub fn new(table_size: TableSize) -> Self {
        Self {
            table_size,
            allow_fallback: true,
        }
    }

    /// Whether a fallback destination may serve alone when no enabled
    /// destination carries weight.
    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    /// Table size this builder produces.
    pub fn table_size(&self) -> TableSize {
        self.table_size
    }

    /// Build a table from a destination snapshot.
    ///
    /// Disabled destinations are ignored. Enabled destinations with zero
    /// weight are kept in the result but own no slot. The same input always
    /// produces the same table.
    pub fn build<T>(&self, destinations: &[Arc<Destination<T>>]) -> Result<MaglevState<T>> {
        let m = self.table_size.get();

        let mut members: Vec<Arc<Destination<T>>> = destinations
            .iter()
            .filter(|d| d.is_enabled())
            .cloned()
            .collect();
        members.sort_by_key(|d| d.id);

        let mut weights: Vec<u32> = members.iter().map(|d| d.weight).collect();
        let mut fallback = false;

        if weights.iter().all(|&w| w == 0) {
            let candidate = destinations
                .iter()
                .filter(|d| d.fallback)
                .min_by_key(|d| d.id)
                .filter(|_| self.allow_fallback);

            match candidate {
                Some(dest) => {
                    warn!(
                        group = %dest.group_id,
                        dest = %dest.id,
                        "No usable destination, serving from fallback"
                    );
                    members = vec![Arc::clone(dest)];
                    weights = vec![1];
                    fallback = true;
                }
                None => return Err(MaglevError::EmptyDestinationSet),
            }
        }

        if members.len() > self.table_size.as_usize() {
            return Err(MaglevError::TooManyDestinations {
                count: members.len(),
                table_size: m,
            });
        }

        let gcd = gcd_weight(&weights);
        let rshift = shift_weight(&weights, gcd, m);

        let perms: Vec<Permutation> = members
            .iter()
            .map(|dest| Permutation::new(dest.id, self.table_size))
            .collect();

        let mut setup: Vec<MaglevDestSetup> = perms
            .iter()
            .zip(&weights)
            .map(|(perm, &weight)| {
                let turns = match (weight / gcd) >> rshift {
                    0 => u32::from(weight != 0),
                    turns => turns,
                };
                MaglevDestSetup {
                    offset: perm.offset(),
                    skip: perm.skip(),
                    perm: perm.offset(),
                    turns,
                    claimed: 0,
                }
            })
            .collect();

        let lookup = populate(&mut setup, &perms, m);

        Ok(MaglevState::new(
            lookup,
            self.table_size,
            members,
            setup,
            gcd,
            rshift,
            fallback,
        ))
    }
}

/// Build a table of `table_size` slots, fallback allowed.
pub fn build<T>(
    destinations: &[Arc<Destination<T>>],
    table_size: TableSize,
) -> Result<MaglevState<T>> {
    TableBuilder::new(table_size).build(destinations)
}

// At least one entry of `setup` has turns >= 1, which guarantees progress.
fn populate(setup: &mut [MaglevDestSetup], perms: &[Permutation], m: u32) -> Box<[u32]> {
    let mut lookup = vec![EMPTY; m as usize];
    let mut filled = 0u32;

    'fill: loop {
        for (idx, (ds, perm)) in setup.iter_mut().zip(perms).enumerate() {
            for _ in 0..ds.turns {
                while lookup[ds.perm as usize] != EMPTY {
                    ds.perm = perm.next_slot(ds.perm);
                }

                lookup[ds.perm as usize] = idx as u32;
                ds.claimed += 1;
                filled += 1;

                if filled == m {
                    break 'fill;
                }
            }
        }
    }

    lookup.into_boxed_slice()
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Greatest common divisor of the non-zero weights, 0 if there are none.
fn gcd_weight(weights: &[u32]) -> u32 {
    weights
        .iter()
        .filter(|&&w| w > 0)
        .fold(0, |g, &w| if g == 0 { w } else { gcd(g, w) })
}

/// Shift that keeps the largest normalized weight within about half the
/// bits of the table size.
fn shift_weight(weights: &[u32], gcd: u32, table_size: u32) -> u32 {
    if gcd == 0 {
        return 0;
    }
    let max = weights.iter().copied().max().unwrap_or(0) / gcd;
    let tab_bits = bit_len(table_size) / 2;
    bit_len(max).saturating_sub(tab_bits)
}

fn bit_len(x: u32) -> u32 {
    u32::BITS - x.leading_zeros()
}
