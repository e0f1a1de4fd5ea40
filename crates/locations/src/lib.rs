//! `stockline-locations` — capacity-bounded placement of batch quantity
//! into physical storage slots.
//!
//! A location is a warehouse slot addressed by its derived position code
//! (`zone+aisle-shelf`). Allocations tie batch quantity to slots and may
//! never exceed the slot's capacity; all mutation goes through the ledger.

pub mod location;
pub mod map;

pub use location::Location;
pub use map::LocationMap;
