use serde::{Deserialize, Serialize};

use stockline_core::{LocationId, Quantity, StockError, StockResult, WarehouseId};

/// A capacity-bounded physical slot (warehouse → zone → aisle → shelf).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    warehouse_id: WarehouseId,
    zone: String,
    aisle: String,
    shelf: String,
    max_capacity: Quantity,
}

impl Location {
    /// Define a slot. Fails on empty address components or a zero capacity.
    pub fn new(
        id: LocationId,
        warehouse_id: WarehouseId,
        zone: impl Into<String>,
        aisle: impl Into<String>,
        shelf: impl Into<String>,
        max_capacity: Quantity,
    ) -> StockResult<Self> {
        let zone = zone.into();
        let aisle = aisle.into();
        let shelf = shelf.into();

        if zone.trim().is_empty() || aisle.trim().is_empty() || shelf.trim().is_empty() {
            return Err(StockError::validation(
                "location address requires zone, aisle and shelf",
            ));
        }
        if max_capacity.is_zero() {
            return Err(StockError::validation("location capacity must be positive"));
        }

        Ok(Self {
            id,
            warehouse_id,
            zone,
            aisle,
            shelf,
            max_capacity,
        })
    }

    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn max_capacity(&self) -> Quantity {
        self.max_capacity
    }

    /// Derived slot address, unique per warehouse: `zone+aisle-shelf`.
    pub fn position_code(&self) -> String {
        format!("{}{}-{}", self.zone, self.aisle, self.shelf)
    }
}
