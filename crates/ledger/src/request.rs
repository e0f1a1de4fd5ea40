use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_batches::QualityState;
use stockline_core::{ActorId, BatchId, CountId, LocationId, ProductId, Quantity, WarehouseId};

/// Where a receipt should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Caller chose the slot.
    Explicit(LocationId),
    /// Let the map pick the least-occupied slot in this warehouse.
    Auto(WarehouseId),
}

/// What a pick consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickSource {
    /// A fixed batch at a fixed slot.
    Batch {
        batch_id: BatchId,
        location_id: LocationId,
    },
    /// First-expire-first-out across the product's pickable batches.
    Fefo,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    /// Quantity appears (bounded by the batch's received quantity).
    In,
    /// Quantity disappears.
    Out,
}

/// The operation-specific part of a movement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Receipt {
        product_id: ProductId,
        manufactured_on: NaiveDate,
        expires_on: Option<NaiveDate>,
        quality_state: QualityState,
        quantity: Quantity,
        placement: Placement,
    },
    Pick {
        product_id: ProductId,
        source: PickSource,
        quantity: Quantity,
    },
    Transfer {
        batch_id: BatchId,
        from_location: LocationId,
        to_location: LocationId,
        quantity: Quantity,
    },
    Adjustment {
        batch_id: BatchId,
        location_id: LocationId,
        direction: AdjustmentDirection,
        quantity: Quantity,
    },
    CountCorrection {
        count_id: CountId,
        batch_id: BatchId,
        location_id: LocationId,
        direction: AdjustmentDirection,
        quantity: Quantity,
    },
}

/// A request for the ledger to record one quantity change.
///
/// The envelope carries who did it, when, and why; the kind carries what.
/// The ledger turns one request into one or more immutable movements (a FEFO
/// pick spanning batches yields one movement per consumed segment, all
/// sharing the reference document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
    pub reason_code: String,
    pub reference_document: Option<String>,
    pub kind: RequestKind,
}

impl MovementRequest {
    pub fn quantity(&self) -> Quantity {
        match &self.kind {
            RequestKind::Receipt { quantity, .. }
            | RequestKind::Pick { quantity, .. }
            | RequestKind::Transfer { quantity, .. }
            | RequestKind::Adjustment { quantity, .. }
            | RequestKind::CountCorrection { quantity, .. } => *quantity,
        }
    }
}
