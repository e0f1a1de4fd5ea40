//! Business-rule error model.

use thiserror::Error;

use crate::id::{BatchId, CountId, CountItemId, LocationId, ProductId};
use crate::quantity::Quantity;

/// Result type used across the inventory core.
pub type StockResult<T> = Result<T, StockError>;

/// Deterministic business-rule violation, surfaced synchronously to the caller.
///
/// Every rejection names the violated invariant and the quantities involved.
/// These are not retryable: they describe a request that cannot be satisfied
/// given current state. Infrastructure faults (store unavailable, poisoned
/// lock) are a distinct class and must never be folded into this enum.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// Movement quantities must be strictly positive.
    #[error("invalid quantity: {requested} (movement quantity must be positive)")]
    InvalidQuantity { requested: u64 },

    #[error("insufficient quantity in batch {batch_id}: requested {requested}, only {available} available")]
    InsufficientBatchQuantity {
        batch_id: BatchId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("batch {batch_id} is blocked for picking (quality state: {quality})")]
    BatchBlocked { batch_id: BatchId, quality: String },

    #[error("capacity exceeded at location {location_id}: {occupied} occupied + {requested} requested > {max_capacity} max")]
    CapacityExceeded {
        location_id: LocationId,
        occupied: Quantity,
        requested: Quantity,
        max_capacity: Quantity,
    },

    #[error("insufficient allocation of batch {batch_id} at location {location_id}: requested {requested}, allocated {allocated}")]
    InsufficientAllocation {
        location_id: LocationId,
        batch_id: BatchId,
        requested: Quantity,
        allocated: Quantity,
    },

    /// FEFO selection exhausted the pickable batches for a product.
    #[error("insufficient stock of product {product_id}: requested {requested}, {available} available across pickable batches")]
    InsufficientStock {
        product_id: ProductId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("count scope conflict: count {existing} is already in progress on an overlapping scope")]
    CountScopeConflict { existing: CountId },

    #[error("count {count_id} has already been started")]
    AlreadyStarted { count_id: CountId },

    /// Counts are one-shot per item; re-counting requires a new count.
    #[error("count item {item_id} already counted: recorded {recorded}, attempted {attempted}")]
    AlreadyCounted {
        item_id: CountItemId,
        recorded: Quantity,
        attempted: Quantity,
    },

    #[error("count {count_id} is incomplete: {pending} of {total} items still pending")]
    IncompleteCount {
        count_id: CountId,
        pending: usize,
        total: usize,
    },

    /// A value failed validation at the boundary (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The request conflicts with the entity's current state.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
