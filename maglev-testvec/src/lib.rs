//! Replays recorded flow/bucket pairs against a Maglev group.
//!
//! A test vector records the group a datapath was configured with and a list
//! of flows together with the hash and bucket the datapath chose for each.
//! [`replay`] rebuilds the same group and checks that every flow still lands
//! where it was recorded.

mod error;
mod replay;
mod vector;

pub use error::{Result, TestVecError};
pub use replay::{replay, Report};
pub use vector::{TestVector, TvEntry};
