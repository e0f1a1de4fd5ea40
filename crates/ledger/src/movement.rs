use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_batches::QualityState;
use stockline_core::{
    ActorId, BatchId, CountId, LocationId, MovementId, ProductId, Quantity, StockError,
    StockResult,
};

/// Batch metadata carried by a receipt movement so the log alone can
/// recreate the batch on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOrigin {
    pub manufactured_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub quality_state: QualityState,
}

/// What kind of quantity change a movement records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MovementKind {
    Receipt { origin: BatchOrigin },
    Pick,
    Transfer,
    Adjustment,
    CountCorrection { count_id: CountId },
}

impl MovementKind {
    pub fn name(&self) -> &'static str {
        match self {
            MovementKind::Receipt { .. } => "receipt",
            MovementKind::Pick => "pick",
            MovementKind::Transfer => "transfer",
            MovementKind::Adjustment => "adjustment",
            MovementKind::CountCorrection { .. } => "count-correction",
        }
    }
}

/// One immutable, append-only record of a quantity change.
///
/// Movements are never mutated or deleted; corrections are new movements.
/// `sequence` is assigned by the ledger on append and is monotonically
/// increasing across the whole log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
    pub kind: MovementKind,
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub quantity: Quantity,
    pub actor_id: ActorId,
    pub reason_code: String,
    pub reference_document: Option<String>,
}

impl StockMovement {
    /// Shape invariant per kind: receipts only arrive, picks only leave,
    /// transfers do both, adjustments/corrections do exactly one.
    pub fn validate_shape(&self) -> StockResult<()> {
        if self.quantity.is_zero() {
            return Err(StockError::InvalidQuantity { requested: 0 });
        }
        let ok = match self.kind {
            MovementKind::Receipt { .. } => {
                self.from_location.is_none() && self.to_location.is_some()
            }
            MovementKind::Pick => self.from_location.is_some() && self.to_location.is_none(),
            MovementKind::Transfer => self.from_location.is_some() && self.to_location.is_some(),
            MovementKind::Adjustment | MovementKind::CountCorrection { .. } => {
                self.from_location.is_some() != self.to_location.is_some()
            }
        };
        if !ok {
            return Err(StockError::invariant(format!(
                "{} movement {} has an invalid from/to shape",
                self.kind.name(),
                self.id
            )));
        }
        Ok(())
    }
}

/// Filter for reading back the movement log. All fields are conjunctive;
/// `after_sequence` makes the listing restartable.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub batch_id: Option<BatchId>,
    pub location_id: Option<LocationId>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub after_sequence: Option<u64>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &StockMovement) -> bool {
        if self.product_id.is_some_and(|p| p != movement.product_id) {
            return false;
        }
        if self.batch_id.is_some_and(|b| b != movement.batch_id) {
            return false;
        }
        if self.location_id.is_some_and(|l| {
            movement.from_location != Some(l) && movement.to_location != Some(l)
        }) {
            return false;
        }
        if self.from.is_some_and(|from| movement.occurred_at < from) {
            return false;
        }
        if self.until.is_some_and(|until| movement.occurred_at > until) {
            return false;
        }
        if self
            .after_sequence
            .is_some_and(|seq| movement.sequence <= seq)
        {
            return false;
        }
        true
    }
}
