//! `stockline-core` — domain foundation for the warehouse inventory core.
//!
//! This crate contains **pure domain** primitives (no infrastructure
//! concerns): strongly-typed identifiers, the non-negative quantity type,
//! and the business-rule error model shared by every other crate.

pub mod error;
pub mod id;
pub mod quantity;

pub use error::{StockError, StockResult};
pub use id::{
    ActorId, BatchId, CountId, CountItemId, LocationId, MovementId, ProductId, WarehouseId,
};
pub use quantity::Quantity;
