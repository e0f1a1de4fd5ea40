//! `stockline-ledger` — the append-only record of every quantity change.
//!
//! The ledger is the single shared-mutation boundary: batch and location
//! state is only ever updated by [`MovementLedger::record`], which plans a
//! movement against current state, applies it atomically, and appends the
//! immutable [`StockMovement`] to the log. Replaying the ordered log from
//! empty state reproduces identical quantities (the log is the source of
//! truth).

pub mod ledger;
pub mod movement;
pub mod request;

pub use ledger::{LedgerError, LedgerResult, MovementLedger};
pub use movement::{BatchOrigin, MovementFilter, MovementKind, StockMovement};
pub use request::{AdjustmentDirection, MovementRequest, PickSource, Placement, RequestKind};
