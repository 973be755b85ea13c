//! Maglev core.
//!
//! This crate holds the destination model, the weighted Maglev table builder
//! and the services that publish built tables to concurrent readers.

pub mod config;
pub mod domain;
pub mod error;
pub mod load_balancer;

pub use config::{
    MaglevConfig, TableSize, TableSizes, DEFAULT_SIZE_INDEX, DEFAULT_TABLE_SIZE_PRIMES,
};
pub use domain::destination::{Bucket, Destination, DestinationId, GroupId};
pub use domain::group::{Group, GroupProps, GroupState};
pub use domain::groups::GroupTable;
pub use domain::registry::DestinationRegistry;
pub use error::{MaglevError, Result};
pub use load_balancer::builder::{build, MaglevDestSetup, TableBuilder};
pub use load_balancer::permutation::Permutation;
pub use load_balancer::service::{MaglevHashService, ServiceFlags, SharedService};
pub use load_balancer::state::MaglevState;
