//! Destinations, their registry and the groups that own them.

pub mod destination;
pub mod group;
pub mod groups;
pub mod registry;
