use std::collections::{BTreeMap, HashMap};

use stockline_core::{BatchId, LocationId, Quantity, StockError, StockResult, WarehouseId};

use crate::location::Location;

/// Location and allocation state holder.
///
/// Same contract as the batch registry: the ledger calls `check_*` while
/// planning and `apply_*` once the plan validated. Locations themselves are
/// warehouse configuration and never deleted while allocations reference
/// them (there is no delete at all here).
#[derive(Debug, Default, Clone)]
pub struct LocationMap {
    locations: HashMap<LocationId, Location>,
    /// Keyed `(location, batch)`; kept sorted so snapshots and reports are
    /// deterministic. Entries are removed when they reach zero.
    allocations: BTreeMap<(LocationId, BatchId), Quantity>,
}

impl LocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot from warehouse configuration.
    ///
    /// Position codes are unique per warehouse.
    pub fn add_location(&mut self, location: Location) -> StockResult<()> {
        if self.locations.contains_key(&location.id()) {
            return Err(StockError::conflict(format!(
                "location {} already exists",
                location.id()
            )));
        }
        let duplicate = self.locations.values().any(|existing| {
            existing.warehouse_id() == location.warehouse_id()
                && existing.position_code() == location.position_code()
        });
        if duplicate {
            return Err(StockError::conflict(format!(
                "position code {} already taken in warehouse {}",
                location.position_code(),
                location.warehouse_id()
            )));
        }
        self.locations.insert(location.id(), location);
        Ok(())
    }

    pub fn get(&self, location_id: LocationId) -> Option<&Location> {
        self.locations.get(&location_id)
    }

    pub fn require(&self, location_id: LocationId) -> StockResult<&Location> {
        self.locations
            .get(&location_id)
            .ok_or_else(|| StockError::not_found("location", location_id))
    }

    /// Locations of one warehouse, ordered by position code.
    pub fn list_for_warehouse(&self, warehouse_id: WarehouseId) -> Vec<&Location> {
        let mut locations: Vec<&Location> = self
            .locations
            .values()
            .filter(|l| l.warehouse_id() == warehouse_id)
            .collect();
        locations.sort_by_key(|l| l.position_code());
        locations
    }

    /// Total quantity currently held at a slot.
    pub fn occupied(&self, location_id: LocationId) -> Quantity {
        self.allocations
            .iter()
            .filter(|((l, _), _)| *l == location_id)
            .map(|(_, q)| *q)
            .sum()
    }

    /// Occupancy as a fraction of capacity, in `[0, 1]` by invariant.
    pub fn occupancy_ratio(&self, location_id: LocationId) -> StockResult<f64> {
        let location = self.require(location_id)?;
        Ok(self.occupied(location_id).ratio_of(location.max_capacity()))
    }

    pub fn allocation(&self, location_id: LocationId, batch_id: BatchId) -> Quantity {
        self.allocations
            .get(&(location_id, batch_id))
            .copied()
            .unwrap_or(Quantity::ZERO)
    }

    /// Allocations at one slot, batch by batch.
    pub fn allocations_at(&self, location_id: LocationId) -> Vec<(BatchId, Quantity)> {
        self.allocations
            .iter()
            .filter(|((l, _), _)| *l == location_id)
            .map(|((_, b), q)| (*b, *q))
            .collect()
    }

    /// Where one batch currently sits.
    pub fn allocations_for_batch(&self, batch_id: BatchId) -> Vec<(LocationId, Quantity)> {
        self.allocations
            .iter()
            .filter(|((_, b), _)| *b == batch_id)
            .map(|((l, _), q)| (*l, *q))
            .collect()
    }

    pub fn total_for_batch(&self, batch_id: BatchId) -> Quantity {
        self.allocations_for_batch(batch_id)
            .into_iter()
            .map(|(_, q)| q)
            .sum()
    }

    /// Every non-zero allocation, ordered by `(location, batch)`.
    pub fn all_allocations(&self) -> Vec<(LocationId, BatchId, Quantity)> {
        self.allocations
            .iter()
            .map(|((l, b), q)| (*l, *b, *q))
            .collect()
    }

    pub fn check_allocate(&self, location_id: LocationId, quantity: Quantity) -> StockResult<()> {
        let location = self.require(location_id)?;
        let occupied = self.occupied(location_id);
        let fits = occupied
            .checked_add(quantity)
            .is_some_and(|total| total <= location.max_capacity());
        if !fits {
            return Err(StockError::CapacityExceeded {
                location_id,
                occupied,
                requested: quantity,
                max_capacity: location.max_capacity(),
            });
        }
        Ok(())
    }

    pub fn check_deallocate(
        &self,
        location_id: LocationId,
        batch_id: BatchId,
        quantity: Quantity,
    ) -> StockResult<()> {
        self.require(location_id)?;
        let allocated = self.allocation(location_id, batch_id);
        if quantity > allocated {
            return Err(StockError::InsufficientAllocation {
                location_id,
                batch_id,
                requested: quantity,
                allocated,
            });
        }
        Ok(())
    }

    pub fn apply_allocate(&mut self, location_id: LocationId, batch_id: BatchId, quantity: Quantity) {
        let slot = self
            .allocations
            .entry((location_id, batch_id))
            .or_insert(Quantity::ZERO);
        *slot = slot.checked_add(quantity).unwrap_or(*slot);
    }

    pub fn apply_deallocate(
        &mut self,
        location_id: LocationId,
        batch_id: BatchId,
        quantity: Quantity,
    ) {
        let key = (location_id, batch_id);
        if let Some(slot) = self.allocations.get_mut(&key) {
            debug_assert!(quantity <= *slot);
            *slot = slot.saturating_sub(quantity);
            if slot.is_zero() {
                self.allocations.remove(&key);
            }
        }
    }

    /// Advisory placement policy for automatic receipts: the location in the
    /// warehouse with the lowest occupancy ratio that still has room for the
    /// whole quantity, ties broken by ascending position code. Not an
    /// invariant — callers are free to place explicitly.
    pub fn suggest_placement(
        &self,
        warehouse_id: WarehouseId,
        quantity: Quantity,
    ) -> StockResult<LocationId> {
        let candidates = self.list_for_warehouse(warehouse_id);
        if candidates.is_empty() {
            return Err(StockError::not_found("warehouse locations", warehouse_id));
        }

        let mut best: Option<(f64, String, LocationId)> = None;
        // Tracked so an exhausted warehouse can report its roomiest slot.
        let mut roomiest: Option<(Quantity, LocationId)> = None;

        for location in candidates {
            let occupied = self.occupied(location.id());
            let remaining = location.max_capacity().saturating_sub(occupied);
            if roomiest.is_none_or(|(r, _)| remaining > r) {
                roomiest = Some((remaining, location.id()));
            }
            if remaining < quantity {
                continue;
            }
            let ratio = occupied.ratio_of(location.max_capacity());
            let key = (ratio, location.position_code(), location.id());
            let better = match &best {
                None => true,
                Some((best_ratio, best_code, _)) => {
                    key.0 < *best_ratio || (key.0 == *best_ratio && key.1 < *best_code)
                }
            };
            if better {
                best = Some(key);
            }
        }

        if let Some((_, _, id)) = best {
            return Ok(id);
        }

        // No slot fits; reject naming the best candidate's numbers.
        let Some((_, location_id)) = roomiest else {
            return Err(StockError::not_found("warehouse locations", warehouse_id));
        };
        let location = self.require(location_id)?;
        Err(StockError::CapacityExceeded {
            location_id,
            occupied: self.occupied(location_id),
            requested: quantity,
            max_capacity: location.max_capacity(),
        })
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
