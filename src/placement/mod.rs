//! Placement: the fleet directory and the region/host selector

pub mod fleet;
pub mod selector;

pub use fleet::{FleetDirectory, InMemoryFleet};
pub use selector::{PlacementHint, PlacementSelector, SearchScope};
