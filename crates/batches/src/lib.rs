//! `stockline-batches` — batch lifecycle for received stock.
//!
//! A batch is one receipt of a product sharing manufacture/expiry metadata.
//! Lifecycle state is never stored: it is recomputed from quantities, expiry
//! and quality on every read (see [`classify`]), so the near-expiry window
//! can change without a migration.

pub mod batch;
pub mod registry;

pub use batch::{classify, Batch, BatchStanding, ExpiryPolicy, LifecycleState, QualityState};
pub use registry::BatchRegistry;
