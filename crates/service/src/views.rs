use chrono::NaiveDate;
use serde::Serialize;

use stockline_batches::{Batch, BatchStanding, LifecycleState, QualityState};
use stockline_core::{BatchId, LocationId, ProductId, Quantity, WarehouseId};
use stockline_locations::Location;

/// A batch as rendered to callers: stored attributes plus the lifecycle
/// standing computed for the request's reference time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchView {
    pub id: BatchId,
    pub product_id: ProductId,
    pub manufactured_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub received_quantity: Quantity,
    pub available_quantity: Quantity,
    pub quality_state: QualityState,
    pub state: LifecycleState,
    pub near_expiry: bool,
}

impl BatchView {
    pub fn new(batch: &Batch, standing: BatchStanding) -> Self {
        Self {
            id: batch.id(),
            product_id: batch.product_id(),
            manufactured_on: batch.manufactured_on(),
            expires_on: batch.expires_on(),
            received_quantity: batch.received_quantity(),
            available_quantity: batch.available_quantity(),
            quality_state: batch.quality_state(),
            state: standing.state,
            near_expiry: standing.near_expiry,
        }
    }
}

/// A location with its current occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationView {
    pub id: LocationId,
    pub warehouse_id: WarehouseId,
    pub position_code: String,
    pub max_capacity: Quantity,
    pub occupied: Quantity,
    pub occupancy_ratio: f64,
    pub near_full: bool,
}

impl LocationView {
    pub fn new(location: &Location, occupied: Quantity, near_full_ratio: f64) -> Self {
        let occupancy_ratio = occupied.ratio_of(location.max_capacity());
        Self {
            id: location.id(),
            warehouse_id: location.warehouse_id(),
            position_code: location.position_code(),
            max_capacity: location.max_capacity(),
            occupied,
            occupancy_ratio,
            near_full: occupancy_ratio >= near_full_ratio,
        }
    }
}

/// Per-location share of a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationStock {
    pub location_id: LocationId,
    pub quantity: Quantity,
}

/// The stock position of one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    /// Sum of available quantity across the product's batches.
    pub available: Quantity,
    /// Catalog reorder check: available has fallen below `reorder_min`.
    pub below_reorder_min: bool,
    pub allocated_by_location: Vec<LocationStock>,
    pub batches: Vec<BatchView>,
}
