//! `stockline-catalog` — read-only product identity and reorder thresholds.
//!
//! The catalog is an external collaborator: the inventory core references
//! products but never mutates them. Only the lookup the core consumes is
//! modeled here.

pub mod product;

pub use product::{InMemoryCatalog, ProductCatalog, ProductRef};
