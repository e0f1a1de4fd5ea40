use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockline_core::{
    ActorId, BatchId, CountId, CountItemId, LocationId, ProductId, Quantity, WarehouseId,
};

/// What a count covers. `None` means "all" on that axis.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountScope {
    pub warehouse_id: Option<WarehouseId>,
    pub product_ids: Option<BTreeSet<ProductId>>,
}

impl CountScope {
    /// Everything, everywhere.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            product_ids: None,
        }
    }

    pub fn products(product_ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            warehouse_id: None,
            product_ids: Some(product_ids.into_iter().collect()),
        }
    }

    /// Does an allocation of `product_id` in `warehouse_id` fall inside this scope?
    pub fn covers(&self, warehouse_id: WarehouseId, product_id: ProductId) -> bool {
        if self.warehouse_id.is_some_and(|w| w != warehouse_id) {
            return false;
        }
        if self
            .product_ids
            .as_ref()
            .is_some_and(|products| !products.contains(&product_id))
        {
            return false;
        }
        true
    }

    /// Two scopes overlap when some allocation could fall inside both.
    pub fn overlaps(&self, other: &CountScope) -> bool {
        let warehouses_overlap = match (self.warehouse_id, other.warehouse_id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        if !warehouses_overlap {
            return false;
        }
        match (&self.product_ids, &other.product_ids) {
            (Some(a), Some(b)) => a.intersection(b).next().is_some(),
            _ => true,
        }
    }
}

/// Count lifecycle. `cancelled` is reachable from `scheduled` or `in-progress`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Matched,
    Discrepant,
}

/// One `(product, batch, location)` tuple within a count.
///
/// `system_quantity` is the snapshot taken at count start and never changes;
/// `counted_quantity` is set exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountItem {
    pub id: CountItemId,
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub location_id: LocationId,
    pub system_quantity: Quantity,
    pub counted_quantity: Option<Quantity>,
    pub counted_by: Option<ActorId>,
    pub status: ItemStatus,
}

impl CountItem {
    /// `counted - system`, once counted. Positive means stock was found.
    pub fn difference(&self) -> Option<i64> {
        self.counted_quantity
            .map(|counted| counted.units() as i64 - self.system_quantity.units() as i64)
    }
}

/// A scheduled or running counting exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCount {
    pub id: CountId,
    pub scope: CountScope,
    pub scheduled_for: NaiveDate,
    pub scheduled_by: ActorId,
    pub status: CountStatus,
    pub items: Vec<CountItem>,
}

impl InventoryCount {
    pub fn pending_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .count()
    }

    pub fn matched_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Matched)
            .count()
    }

    pub fn discrepant_items(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Discrepant)
            .count()
    }

    /// Count accuracy: matched over total. An empty count is trivially accurate.
    pub fn accuracy(&self) -> f64 {
        if self.items.is_empty() {
            return 1.0;
        }
        self.matched_items() as f64 / self.items.len() as f64
    }
}

/// Reporting view handed to the surrounding layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountReport {
    pub count_id: CountId,
    pub status: CountStatus,
    pub total_items: usize,
    pub discrepancies: usize,
    pub accuracy_percent: f64,
    pub items: Vec<CountItem>,
}

impl CountReport {
    pub fn from_count(count: &InventoryCount) -> Self {
        Self {
            count_id: count.id,
            status: count.status,
            total_items: count.items.len(),
            discrepancies: count.discrepant_items(),
            accuracy_percent: count.accuracy() * 100.0,
            items: count.items.clone(),
        }
    }
}
