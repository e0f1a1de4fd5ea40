//! `stockline-counts` — cycle counting against the ledger.
//!
//! A cycle count snapshots what the system believes sits at each
//! `(product, batch, location)` tuple, records what was physically found,
//! and reconciles the difference through correcting movements posted to the
//! ledger. Counts are one-shot per item; re-counting means a new count.

pub mod count;
pub mod engine;

pub use count::{CountItem, CountReport, CountScope, CountStatus, InventoryCount, ItemStatus};
pub use engine::CycleCountEngine;
