//! Maglev table construction and publication.

pub mod builder;
pub mod permutation;
pub mod service;
pub mod state;
