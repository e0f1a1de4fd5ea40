use std::sync::RwLock;

use thiserror::Error;
use uuid::Uuid;

use stockline_batches::{Batch, BatchRegistry, QualityState};
use stockline_core::{
    BatchId, LocationId, MovementId, ProductId, Quantity, StockError, StockResult, WarehouseId,
};
use stockline_locations::{Location, LocationMap};

use crate::movement::{BatchOrigin, MovementFilter, MovementKind, StockMovement};
use crate::request::{AdjustmentDirection, MovementRequest, PickSource, Placement, RequestKind};

/// Ledger operation error.
///
/// `Domain` is the business-rule class: deterministic, not retryable.
/// `Store` is the infrastructure class (lock poisoned, corrupted log on
/// rebuild): retryable by the caller layer, and never to be conflated with
/// the former.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] StockError),

    #[error("ledger store unavailable: {0}")]
    Store(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug)]
struct LedgerState {
    batches: BatchRegistry,
    locations: LocationMap,
    log: Vec<StockMovement>,
    next_sequence: u64,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            batches: BatchRegistry::new(),
            locations: LocationMap::new(),
            log: Vec::new(),
            next_sequence: 1,
        }
    }
}

/// The single entry point for all quantity change.
///
/// `record` plans a request against current state, applies it, and appends
/// the resulting movements — one serializable unit behind a single writer
/// lock, so two concurrent movements touching the same batch or location
/// cannot lose an update. Reads take the shared side and may observe a
/// slightly stale snapshot; no read blocks a writer longer than a clone.
#[derive(Debug)]
pub struct MovementLedger {
    state: RwLock<LedgerState>,
}

impl Default for MovementLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::new()),
        }
    }

    fn read(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Store("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Store("ledger lock poisoned".to_string()))
    }

    /// Register a storage slot (warehouse configuration path).
    pub fn add_location(&self, location: Location) -> LedgerResult<()> {
        let mut state = self.write()?;
        state.locations.add_location(location)?;
        Ok(())
    }

    /// Transition a batch's quality state; serialized with movements by the
    /// same lock. Returns the previous state.
    pub fn set_quality_state(
        &self,
        batch_id: BatchId,
        quality: QualityState,
    ) -> LedgerResult<QualityState> {
        let mut state = self.write()?;
        let previous = state.batches.set_quality_state(batch_id, quality)?;
        tracing::debug!(%batch_id, from = %previous, to = %quality, "quality state changed");
        Ok(previous)
    }

    /// Record one quantity change. See [`Self::record_all`].
    pub fn record(&self, request: MovementRequest) -> LedgerResult<Vec<StockMovement>> {
        self.record_all(vec![request])
    }

    /// Record a group of quantity changes as one atomic unit.
    ///
    /// Every request is planned against a scratch copy of current state;
    /// only when the whole group validates is the scratch swapped in and the
    /// movements appended. On any failure nothing is applied and nothing is
    /// appended.
    pub fn record_all(&self, requests: Vec<MovementRequest>) -> LedgerResult<Vec<StockMovement>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.write()?;
        let mut batches = state.batches.clone();
        let mut locations = state.locations.clone();

        let mut planned = Vec::new();
        for request in &requests {
            planned.extend(plan_request(&mut batches, &mut locations, request)?);
        }

        let mut committed = Vec::with_capacity(planned.len());
        for mut movement in planned {
            movement.sequence = state.next_sequence;
            state.next_sequence += 1;
            debug_assert!(movement.validate_shape().is_ok());
            tracing::debug!(
                kind = movement.kind.name(),
                sequence = movement.sequence,
                product_id = %movement.product_id,
                batch_id = %movement.batch_id,
                quantity = %movement.quantity,
                "movement recorded"
            );
            committed.push(movement);
        }

        state.batches = batches;
        state.locations = locations;
        state.log.extend(committed.iter().cloned());
        Ok(committed)
    }

    /// Rebuild a ledger from warehouse configuration plus the ordered log.
    ///
    /// The log is the source of truth: replaying it from empty state must
    /// reproduce identical batch and allocation quantities. A log that does
    /// not apply cleanly is corrupt and surfaces as a `Store` error.
    pub fn rebuild(locations: Vec<Location>, log: &[StockMovement]) -> LedgerResult<MovementLedger> {
        let mut state = LedgerState::new();
        for location in locations {
            state.locations.add_location(location)?;
        }

        let mut last_sequence = 0u64;
        for movement in log {
            if movement.sequence <= last_sequence {
                return Err(LedgerError::Store(format!(
                    "movement log is not strictly ordered at sequence {} (previous {})",
                    movement.sequence, last_sequence
                )));
            }
            movement.validate_shape().map_err(|e| {
                LedgerError::Store(format!("movement {} fails shape validation: {e}", movement.id))
            })?;
            replay_movement(&mut state.batches, &mut state.locations, movement)
                .map_err(|e| LedgerError::Store(format!("log does not replay: {e}")))?;
            last_sequence = movement.sequence;
            state.log.push(movement.clone());
        }
        state.next_sequence = last_sequence + 1;

        tracing::info!(movements = state.log.len(), "ledger rebuilt from movement log");
        Ok(MovementLedger {
            state: RwLock::new(state),
        })
    }

    // ---- queries (shared lock, clone out) ----

    pub fn batch(&self, batch_id: BatchId) -> LedgerResult<Batch> {
        let state = self.read()?;
        Ok(state.batches.require(batch_id)?.clone())
    }

    pub fn batches_for_product(&self, product_id: ProductId) -> LedgerResult<Vec<Batch>> {
        let state = self.read()?;
        Ok(state
            .batches
            .batches_for_product(product_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn location(&self, location_id: LocationId) -> LedgerResult<Location> {
        let state = self.read()?;
        Ok(state.locations.require(location_id)?.clone())
    }

    pub fn locations_for_warehouse(&self, warehouse_id: WarehouseId) -> LedgerResult<Vec<Location>> {
        let state = self.read()?;
        Ok(state
            .locations
            .list_for_warehouse(warehouse_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn occupancy_ratio(&self, location_id: LocationId) -> LedgerResult<f64> {
        let state = self.read()?;
        Ok(state.locations.occupancy_ratio(location_id)?)
    }

    pub fn allocations_at(&self, location_id: LocationId) -> LedgerResult<Vec<(BatchId, Quantity)>> {
        let state = self.read()?;
        state.locations.require(location_id)?;
        Ok(state.locations.allocations_at(location_id))
    }

    pub fn allocations_for_batch(
        &self,
        batch_id: BatchId,
    ) -> LedgerResult<Vec<(LocationId, Quantity)>> {
        let state = self.read()?;
        Ok(state.locations.allocations_for_batch(batch_id))
    }

    /// Every non-zero allocation, ordered; the cycle-count snapshot source.
    pub fn all_allocations(&self) -> LedgerResult<Vec<(LocationId, BatchId, Quantity)>> {
        let state = self.read()?;
        Ok(state.locations.all_allocations())
    }

    /// Movements matching `filter`, ordered by sequence (restartable via
    /// `filter.after_sequence`).
    pub fn movements(&self, filter: &MovementFilter) -> LedgerResult<Vec<StockMovement>> {
        let state = self.read()?;
        Ok(state
            .log
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }

    pub fn log_len(&self) -> LedgerResult<usize> {
        Ok(self.read()?.log.len())
    }
}

fn plan_request(
    batches: &mut BatchRegistry,
    locations: &mut LocationMap,
    request: &MovementRequest,
) -> StockResult<Vec<StockMovement>> {
    if request.quantity().is_zero() {
        return Err(StockError::InvalidQuantity { requested: 0 });
    }
    if request.reason_code.trim().is_empty() {
        return Err(StockError::validation("movement requires a reason code"));
    }

    match &request.kind {
        RequestKind::Receipt {
            product_id,
            manufactured_on,
            expires_on,
            quality_state,
            quantity,
            placement,
        } => {
            let location_id = match placement {
                Placement::Explicit(location_id) => {
                    locations.require(*location_id)?;
                    *location_id
                }
                Placement::Auto(warehouse_id) => {
                    locations.suggest_placement(*warehouse_id, *quantity)?
                }
            };
            locations.check_allocate(location_id, *quantity)?;

            let batch_id = BatchId::new();
            batches.insert_received(Batch::received(
                batch_id,
                *product_id,
                *manufactured_on,
                *expires_on,
                *quantity,
                *quality_state,
            ))?;
            locations.apply_allocate(location_id, batch_id, *quantity);

            Ok(vec![build_movement(
                request,
                MovementKind::Receipt {
                    origin: BatchOrigin {
                        manufactured_on: *manufactured_on,
                        expires_on: *expires_on,
                        quality_state: *quality_state,
                    },
                },
                *product_id,
                batch_id,
                None,
                Some(location_id),
                *quantity,
                request.reference_document.clone(),
            )])
        }

        RequestKind::Pick {
            product_id,
            source,
            quantity,
        } => match source {
            PickSource::Batch {
                batch_id,
                location_id,
            } => {
                let batch = batches.require(*batch_id)?;
                if batch.product_id() != *product_id {
                    return Err(StockError::validation(format!(
                        "batch {batch_id} does not belong to product {product_id}"
                    )));
                }
                batches.check_pick(*batch_id, *quantity)?;
                locations.check_deallocate(*location_id, *batch_id, *quantity)?;
                batches.apply_decrease(*batch_id, *quantity);
                locations.apply_deallocate(*location_id, *batch_id, *quantity);

                Ok(vec![build_movement(
                    request,
                    MovementKind::Pick,
                    *product_id,
                    *batch_id,
                    Some(*location_id),
                    None,
                    *quantity,
                    request.reference_document.clone(),
                )])
            }
            PickSource::Fefo => {
                plan_fefo_pick(batches, locations, request, *product_id, *quantity)
            }
        },

        RequestKind::Transfer {
            batch_id,
            from_location,
            to_location,
            quantity,
        } => {
            if from_location == to_location {
                return Err(StockError::validation(
                    "transfer requires two distinct locations",
                ));
            }
            let product_id = batches.require(*batch_id)?.product_id();
            locations.check_deallocate(*from_location, *batch_id, *quantity)?;
            locations.apply_deallocate(*from_location, *batch_id, *quantity);
            locations.check_allocate(*to_location, *quantity)?;
            locations.apply_allocate(*to_location, *batch_id, *quantity);

            Ok(vec![build_movement(
                request,
                MovementKind::Transfer,
                product_id,
                *batch_id,
                Some(*from_location),
                Some(*to_location),
                *quantity,
                request.reference_document.clone(),
            )])
        }

        RequestKind::Adjustment {
            batch_id,
            location_id,
            direction,
            quantity,
        } => plan_one_sided(
            batches,
            locations,
            request,
            MovementKind::Adjustment,
            *batch_id,
            *location_id,
            *direction,
            *quantity,
        ),

        RequestKind::CountCorrection {
            count_id,
            batch_id,
            location_id,
            direction,
            quantity,
        } => plan_one_sided(
            batches,
            locations,
            request,
            MovementKind::CountCorrection {
                count_id: *count_id,
            },
            *batch_id,
            *location_id,
            *direction,
            *quantity,
        ),
    }
}

/// FEFO: consume batches ordered by expiry (undated last), then manufacture
/// date; within a batch, slots by ascending position code. One movement per
/// consumed `(batch, location)` segment, all sharing a reference document.
fn plan_fefo_pick(
    batches: &mut BatchRegistry,
    locations: &mut LocationMap,
    request: &MovementRequest,
    product_id: ProductId,
    quantity: Quantity,
) -> StockResult<Vec<StockMovement>> {
    let candidates: Vec<(BatchId, Quantity)> = batches
        .pickable_in_fefo_order(product_id, request.occurred_at)
        .into_iter()
        .map(|b| (b.id(), b.available_quantity()))
        .collect();

    let available: Quantity = candidates.iter().map(|(_, q)| *q).sum();
    if available < quantity {
        return Err(StockError::InsufficientStock {
            product_id,
            requested: quantity,
            available,
        });
    }

    let reference = request
        .reference_document
        .clone()
        .unwrap_or_else(|| format!("pick-{}", Uuid::now_v7()));

    let mut movements = Vec::new();
    let mut remaining = quantity;
    for (batch_id, batch_available) in candidates {
        if remaining.is_zero() {
            break;
        }
        let take_from_batch = batch_available.min(remaining);

        let mut slots = locations.allocations_for_batch(batch_id);
        slots.sort_by_key(|(location_id, _)| {
            locations
                .get(*location_id)
                .map(|l| l.position_code())
                .unwrap_or_default()
        });

        let mut batch_remaining = take_from_batch;
        for (location_id, allocated) in slots {
            if batch_remaining.is_zero() {
                break;
            }
            let take = allocated.min(batch_remaining);
            batches.check_pick(batch_id, take)?;
            locations.check_deallocate(location_id, batch_id, take)?;
            batches.apply_decrease(batch_id, take);
            locations.apply_deallocate(location_id, batch_id, take);
            movements.push(build_movement(
                request,
                MovementKind::Pick,
                product_id,
                batch_id,
                Some(location_id),
                None,
                take,
                Some(reference.clone()),
            ));
            batch_remaining = batch_remaining.saturating_sub(take);
        }

        if !batch_remaining.is_zero() {
            // Conservation makes this unreachable; surface it rather than panic.
            return Err(StockError::invariant(format!(
                "batch {batch_id}: available quantity diverges from its allocations"
            )));
        }
        remaining = remaining.saturating_sub(take_from_batch);
    }

    Ok(movements)
}

#[allow(clippy::too_many_arguments)]
fn plan_one_sided(
    batches: &mut BatchRegistry,
    locations: &mut LocationMap,
    request: &MovementRequest,
    kind: MovementKind,
    batch_id: BatchId,
    location_id: LocationId,
    direction: AdjustmentDirection,
    quantity: Quantity,
) -> StockResult<Vec<StockMovement>> {
    let product_id = batches.require(batch_id)?.product_id();
    let (from, to) = match direction {
        AdjustmentDirection::Out => {
            batches.check_decrease(batch_id, quantity)?;
            locations.check_deallocate(location_id, batch_id, quantity)?;
            batches.apply_decrease(batch_id, quantity);
            locations.apply_deallocate(location_id, batch_id, quantity);
            (Some(location_id), None)
        }
        AdjustmentDirection::In => {
            batches.check_increase(batch_id, quantity)?;
            locations.check_allocate(location_id, quantity)?;
            batches.apply_increase(batch_id, quantity);
            locations.apply_allocate(location_id, batch_id, quantity);
            (None, Some(location_id))
        }
    };

    Ok(vec![build_movement(
        request,
        kind,
        product_id,
        batch_id,
        from,
        to,
        quantity,
        request.reference_document.clone(),
    )])
}

#[allow(clippy::too_many_arguments)]
fn build_movement(
    request: &MovementRequest,
    kind: MovementKind,
    product_id: ProductId,
    batch_id: BatchId,
    from_location: Option<LocationId>,
    to_location: Option<LocationId>,
    quantity: Quantity,
    reference_document: Option<String>,
) -> StockMovement {
    StockMovement {
        id: MovementId::new(),
        sequence: 0, // assigned on commit
        occurred_at: request.occurred_at,
        kind,
        product_id,
        batch_id,
        from_location,
        to_location,
        quantity,
        actor_id: request.actor_id,
        reason_code: request.reason_code.clone(),
        reference_document,
    }
}

/// Apply one already-recorded movement during rebuild. Quantity checks only:
/// quality transitions are not movements, so replay must not re-gate on the
/// quality state a batch happened to be recreated with.
fn replay_movement(
    batches: &mut BatchRegistry,
    locations: &mut LocationMap,
    movement: &StockMovement,
) -> StockResult<()> {
    match &movement.kind {
        MovementKind::Receipt { origin } => {
            let to = movement
                .to_location
                .ok_or_else(|| StockError::invariant("receipt without destination"))?;
            locations.check_allocate(to, movement.quantity)?;
            batches.insert_received(Batch::received(
                movement.batch_id,
                movement.product_id,
                origin.manufactured_on,
                origin.expires_on,
                movement.quantity,
                origin.quality_state,
            ))?;
            locations.apply_allocate(to, movement.batch_id, movement.quantity);
        }
        MovementKind::Pick => {
            let from = movement
                .from_location
                .ok_or_else(|| StockError::invariant("pick without source"))?;
            batches.check_decrease(movement.batch_id, movement.quantity)?;
            locations.check_deallocate(from, movement.batch_id, movement.quantity)?;
            batches.apply_decrease(movement.batch_id, movement.quantity);
            locations.apply_deallocate(from, movement.batch_id, movement.quantity);
        }
        MovementKind::Transfer => {
            let (from, to) = match (movement.from_location, movement.to_location) {
                (Some(from), Some(to)) => (from, to),
                _ => return Err(StockError::invariant("transfer requires both locations")),
            };
            locations.check_deallocate(from, movement.batch_id, movement.quantity)?;
            locations.apply_deallocate(from, movement.batch_id, movement.quantity);
            locations.check_allocate(to, movement.quantity)?;
            locations.apply_allocate(to, movement.batch_id, movement.quantity);
        }
        MovementKind::Adjustment | MovementKind::CountCorrection { .. } => {
            match (movement.from_location, movement.to_location) {
                (Some(from), None) => {
                    batches.check_decrease(movement.batch_id, movement.quantity)?;
                    locations.check_deallocate(from, movement.batch_id, movement.quantity)?;
                    batches.apply_decrease(movement.batch_id, movement.quantity);
                    locations.apply_deallocate(from, movement.batch_id, movement.quantity);
                }
                (None, Some(to)) => {
                    batches.check_increase(movement.batch_id, movement.quantity)?;
                    locations.check_allocate(to, movement.quantity)?;
                    batches.apply_increase(movement.batch_id, movement.quantity);
                    locations.apply_allocate(to, movement.batch_id, movement.quantity);
                }
                _ => {
                    return Err(StockError::invariant(
                        "adjustment requires exactly one side",
                    ))
                }
            }
        }
    }
    Ok(())
}
