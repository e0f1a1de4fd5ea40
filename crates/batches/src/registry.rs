use std::collections::HashMap;

use chrono::{DateTime, Utc};

use stockline_core::{BatchId, ProductId, Quantity, StockError, StockResult};

use crate::batch::{Batch, QualityState};

/// Batch state holder.
///
/// Quantity mutation happens exclusively through the movement ledger, which
/// calls the `check_*` primitives while planning a movement and the matching
/// `apply_*` primitives once the whole plan has validated. `check_*` never
/// mutates; `apply_*` never fails.
#[derive(Debug, Default, Clone)]
pub struct BatchRegistry {
    batches: HashMap<BatchId, Batch>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, batch_id: BatchId) -> Option<&Batch> {
        self.batches.get(&batch_id)
    }

    pub fn require(&self, batch_id: BatchId) -> StockResult<&Batch> {
        self.batches
            .get(&batch_id)
            .ok_or_else(|| StockError::not_found("batch", batch_id))
    }

    pub fn batches_for_product(&self, product_id: ProductId) -> Vec<&Batch> {
        let mut batches: Vec<&Batch> = self
            .batches
            .values()
            .filter(|b| b.product_id() == product_id)
            .collect();
        batches.sort_by_key(|b| b.id());
        batches
    }

    /// Batches eligible for automatic FEFO selection: approved quality,
    /// not past expiry, something left to pick. Ordered first-expire-first,
    /// `None` expiry last, manufacture date as tiebreaker.
    pub fn pickable_in_fefo_order(
        &self,
        product_id: ProductId,
        as_of: DateTime<Utc>,
    ) -> Vec<&Batch> {
        let mut batches: Vec<&Batch> = self
            .batches
            .values()
            .filter(|b| {
                b.product_id() == product_id
                    && !b.quality_state().is_blocked()
                    && !b.is_expired(as_of)
                    && !b.available_quantity().is_zero()
            })
            .collect();
        batches.sort_by_key(|b| b.fefo_key());
        batches
    }

    /// Register a batch created by a receipt movement.
    pub fn insert_received(&mut self, batch: Batch) -> StockResult<()> {
        if self.batches.contains_key(&batch.id()) {
            return Err(StockError::conflict(format!(
                "batch {} already exists",
                batch.id()
            )));
        }
        self.batches.insert(batch.id(), batch);
        Ok(())
    }

    /// Validate that `quantity` can be picked from the batch. Picks are
    /// gated on quality; adjustments and corrections are not (see
    /// [`Self::check_decrease`]).
    pub fn check_pick(&self, batch_id: BatchId, quantity: Quantity) -> StockResult<()> {
        let batch = self.require(batch_id)?;
        if batch.quality_state().is_blocked() {
            return Err(StockError::BatchBlocked {
                batch_id,
                quality: batch.quality_state().to_string(),
            });
        }
        self.check_decrease(batch_id, quantity)
    }

    /// Validate that `quantity` can leave the batch, regardless of quality
    /// state. Quality only freezes picks; a count correction still has to be
    /// able to write down a quarantined batch.
    pub fn check_decrease(&self, batch_id: BatchId, quantity: Quantity) -> StockResult<()> {
        let batch = self.require(batch_id)?;
        if quantity > batch.available_quantity() {
            return Err(StockError::InsufficientBatchQuantity {
                batch_id,
                requested: quantity,
                available: batch.available_quantity(),
            });
        }
        Ok(())
    }

    /// Validate that `quantity` can be credited back to the batch without
    /// exceeding what was originally received.
    pub fn check_increase(&self, batch_id: BatchId, quantity: Quantity) -> StockResult<()> {
        let batch = self.require(batch_id)?;
        let headroom = batch
            .received_quantity()
            .saturating_sub(batch.available_quantity());
        if quantity > headroom {
            return Err(StockError::invariant(format!(
                "batch {batch_id}: increasing by {quantity} would exceed received quantity \
                 ({} available of {} received)",
                batch.available_quantity(),
                batch.received_quantity()
            )));
        }
        Ok(())
    }

    pub fn apply_decrease(&mut self, batch_id: BatchId, quantity: Quantity) {
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.apply_decrease(quantity);
        }
    }

    pub fn apply_increase(&mut self, batch_id: BatchId, quantity: Quantity) {
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.apply_increase(quantity);
        }
    }

    /// Transition a batch's quality state.
    ///
    /// `rejected` can only be left for re-inspection (`quarantined`), never
    /// straight back to `approved`. Returns the previous state.
    pub fn set_quality_state(
        &mut self,
        batch_id: BatchId,
        state: QualityState,
    ) -> StockResult<QualityState> {
        let batch = self
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| StockError::not_found("batch", batch_id))?;

        let previous = batch.quality_state();
        if previous == state {
            return Err(StockError::conflict(format!(
                "batch {batch_id} is already {state}"
            )));
        }
        if previous == QualityState::Rejected && state == QualityState::Approved {
            return Err(StockError::invariant(format!(
                "batch {batch_id}: rejected batches must pass through quarantine before approval"
            )));
        }

        batch.set_quality_state(state);
        Ok(previous)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
