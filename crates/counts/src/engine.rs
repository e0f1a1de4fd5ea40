use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

use stockline_core::{
    ActorId, CountId, CountItemId, Quantity, StockError, StockResult,
};
use stockline_ledger::{
    AdjustmentDirection, LedgerError, LedgerResult, MovementLedger, MovementRequest, RequestKind,
};

use crate::count::{
    CountItem, CountReport, CountScope, CountStatus, InventoryCount, ItemStatus,
};

/// Drives scheduled physical counts and reconciles them through the ledger.
///
/// One count per overlapping scope at a time: a `start` whose scope overlaps
/// an in-progress count is rejected, and the snapshot itself is taken in a
/// single consistent read of the ledger.
#[derive(Debug)]
pub struct CycleCountEngine {
    ledger: Arc<MovementLedger>,
    counts: RwLock<HashMap<CountId, InventoryCount>>,
}

impl CycleCountEngine {
    pub fn new(ledger: Arc<MovementLedger>) -> Self {
        Self {
            ledger,
            counts: RwLock::new(HashMap::new()),
        }
    }

    fn counts_read(
        &self,
    ) -> LedgerResult<std::sync::RwLockReadGuard<'_, HashMap<CountId, InventoryCount>>> {
        self.counts
            .read()
            .map_err(|_| LedgerError::Store("count store lock poisoned".to_string()))
    }

    fn counts_write(
        &self,
    ) -> LedgerResult<std::sync::RwLockWriteGuard<'_, HashMap<CountId, InventoryCount>>> {
        self.counts
            .write()
            .map_err(|_| LedgerError::Store("count store lock poisoned".to_string()))
    }

    /// Schedule a new count over `scope`.
    pub fn schedule(
        &self,
        scope: CountScope,
        scheduled_for: NaiveDate,
        scheduled_by: ActorId,
    ) -> LedgerResult<InventoryCount> {
        let count = InventoryCount {
            id: CountId::new(),
            scope,
            scheduled_for,
            scheduled_by,
            status: CountStatus::Scheduled,
            items: Vec::new(),
        };
        let mut counts = self.counts_write()?;
        counts.insert(count.id, count.clone());
        tracing::debug!(count_id = %count.id, "count scheduled");
        Ok(count)
    }

    /// Snapshot current allocations into count items and move to in-progress.
    pub fn start(&self, count_id: CountId) -> LedgerResult<InventoryCount> {
        let mut counts = self.counts_write()?;

        let scope = {
            let count = counts
                .get(&count_id)
                .ok_or_else(|| StockError::not_found("count", count_id))?;
            if count.status != CountStatus::Scheduled {
                return Err(StockError::AlreadyStarted { count_id }.into());
            }
            count.scope.clone()
        };

        if let Some(existing) = counts.values().find(|other| {
            other.id != count_id
                && other.status == CountStatus::InProgress
                && other.scope.overlaps(&scope)
        }) {
            return Err(StockError::CountScopeConflict {
                existing: existing.id,
            }
            .into());
        }

        let items = self.snapshot_items(&scope)?;

        let count = counts
            .get_mut(&count_id)
            .ok_or_else(|| StockError::not_found("count", count_id))?;
        count.items = items;
        count.status = CountStatus::InProgress;
        tracing::info!(count_id = %count_id, items = count.items.len(), "count started");
        Ok(count.clone())
    }

    /// Current allocations falling inside `scope`, one item per
    /// `(product, batch, location)` tuple, in stable order.
    fn snapshot_items(&self, scope: &CountScope) -> LedgerResult<Vec<CountItem>> {
        let mut items = Vec::new();
        for (location_id, batch_id, quantity) in self.ledger.all_allocations()? {
            let warehouse_id = self.ledger.location(location_id)?.warehouse_id();
            let product_id = self.ledger.batch(batch_id)?.product_id();
            if !scope.covers(warehouse_id, product_id) {
                continue;
            }
            items.push(CountItem {
                id: CountItemId::new(),
                product_id,
                batch_id,
                location_id,
                system_quantity: quantity,
                counted_quantity: None,
                counted_by: None,
                status: ItemStatus::Pending,
            });
        }
        Ok(items)
    }

    /// Record the physically counted quantity for one item.
    ///
    /// One-shot per item: repeating the same value is an idempotent no-op,
    /// a different value is rejected (re-counting requires a new count).
    pub fn record_count(
        &self,
        count_id: CountId,
        item_id: CountItemId,
        counted_quantity: Quantity,
        counted_by: ActorId,
    ) -> LedgerResult<CountItem> {
        let mut counts = self.counts_write()?;
        let count = counts
            .get_mut(&count_id)
            .ok_or_else(|| StockError::not_found("count", count_id))?;
        if count.status != CountStatus::InProgress {
            return Err(StockError::conflict(format!(
                "count {count_id} is not in progress"
            ))
            .into());
        }

        let item = count
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| StockError::not_found("count item", item_id))?;

        if let Some(recorded) = item.counted_quantity {
            if recorded == counted_quantity {
                return Ok(item.clone());
            }
            return Err(StockError::AlreadyCounted {
                item_id,
                recorded,
                attempted: counted_quantity,
            }
            .into());
        }

        item.counted_quantity = Some(counted_quantity);
        item.counted_by = Some(counted_by);
        item.status = if counted_quantity == item.system_quantity {
            ItemStatus::Matched
        } else {
            ItemStatus::Discrepant
        };
        Ok(item.clone())
    }

    /// Post correcting movements for every discrepancy and complete the count.
    ///
    /// All corrections are planned and applied as one atomic ledger unit; if
    /// any is rejected the count stays in progress and nothing is applied.
    pub fn finalize(
        &self,
        count_id: CountId,
        actor_id: ActorId,
        occurred_at: DateTime<Utc>,
    ) -> LedgerResult<CountReport> {
        let mut counts = self.counts_write()?;
        let count = counts
            .get_mut(&count_id)
            .ok_or_else(|| StockError::not_found("count", count_id))?;
        if count.status != CountStatus::InProgress {
            return Err(StockError::conflict(format!(
                "count {count_id} is not in progress"
            ))
            .into());
        }

        let pending = count.pending_items();
        if pending > 0 {
            return Err(StockError::IncompleteCount {
                count_id,
                pending,
                total: count.items.len(),
            }
            .into());
        }

        let corrections = count
            .items
            .iter()
            .filter(|item| item.status == ItemStatus::Discrepant)
            .map(|item| correction_for(item, count_id, actor_id, occurred_at))
            .collect::<StockResult<Vec<MovementRequest>>>()?;

        let posted = self.ledger.record_all(corrections)?;
        count.status = CountStatus::Completed;
        tracing::info!(
            count_id = %count_id,
            corrections = posted.len(),
            accuracy = count.accuracy(),
            "count finalized"
        );
        Ok(CountReport::from_count(count))
    }

    /// Cancel from `scheduled` or `in-progress`; terminal states reject.
    pub fn cancel(&self, count_id: CountId) -> LedgerResult<InventoryCount> {
        let mut counts = self.counts_write()?;
        let count = counts
            .get_mut(&count_id)
            .ok_or_else(|| StockError::not_found("count", count_id))?;
        match count.status {
            CountStatus::Scheduled | CountStatus::InProgress => {
                count.status = CountStatus::Cancelled;
                tracing::debug!(count_id = %count_id, "count cancelled");
                Ok(count.clone())
            }
            CountStatus::Completed | CountStatus::Cancelled => Err(StockError::conflict(
                format!("count {count_id} is already terminal"),
            )
            .into()),
        }
    }

    pub fn get(&self, count_id: CountId) -> LedgerResult<InventoryCount> {
        let counts = self.counts_read()?;
        counts
            .get(&count_id)
            .cloned()
            .ok_or_else(|| StockError::not_found("count", count_id).into())
    }

    pub fn report(&self, count_id: CountId) -> LedgerResult<CountReport> {
        Ok(CountReport::from_count(&self.get(count_id)?))
    }
}

/// Translate one discrepant item into its correcting movement: positive
/// difference is an unattributed receipt back into the slot, negative is a
/// correction pick out of it.
fn correction_for(
    item: &CountItem,
    count_id: CountId,
    actor_id: ActorId,
    occurred_at: DateTime<Utc>,
) -> StockResult<MovementRequest> {
    let counted = item
        .counted_quantity
        .ok_or_else(|| StockError::invariant("discrepant item without a counted quantity"))?;

    let (direction, magnitude) = if counted > item.system_quantity {
        (
            AdjustmentDirection::In,
            counted.saturating_sub(item.system_quantity),
        )
    } else {
        (
            AdjustmentDirection::Out,
            item.system_quantity.saturating_sub(counted),
        )
    };

    Ok(MovementRequest {
        actor_id,
        occurred_at,
        reason_code: "cycle-count".to_string(),
        reference_document: Some(format!("count-{count_id}")),
        kind: RequestKind::CountCorrection {
            count_id,
            batch_id: item.batch_id,
            location_id: item.location_id,
            direction,
            quantity: magnitude,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockline_batches::QualityState;
    use stockline_core::{LocationId, ProductId, WarehouseId};
    use stockline_ledger::{MovementFilter, MovementKind, PickSource, Placement};
    use stockline_locations::Location;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        ledger: Arc<MovementLedger>,
        engine: CycleCountEngine,
        warehouse: WarehouseId,
    }

    impl Fixture {
        fn new() -> Self {
            let ledger = Arc::new(MovementLedger::new());
            let engine = CycleCountEngine::new(Arc::clone(&ledger));
            Self {
                ledger,
                engine,
                warehouse: WarehouseId::new(),
            }
        }

        fn slot(&self, zone: &str, cap: u64) -> LocationId {
            let id = LocationId::new();
            self.ledger
                .add_location(
                    Location::new(id, self.warehouse, zone, "01", "1", Quantity::new(cap))
                        .unwrap(),
                )
                .unwrap();
            id
        }

        fn receive(&self, product_id: ProductId, qty: u64, location_id: LocationId) -> stockline_core::BatchId {
            self.ledger
                .record(MovementRequest {
                    actor_id: ActorId::new(),
                    occurred_at: as_of(),
                    reason_code: "receipt".to_string(),
                    reference_document: None,
                    kind: RequestKind::Receipt {
                        product_id,
                        manufactured_on: date(2024, 5, 1),
                        expires_on: None,
                        quality_state: QualityState::Approved,
                        quantity: Quantity::new(qty),
                        placement: Placement::Explicit(location_id),
                    },
                })
                .unwrap()[0]
                .batch_id
        }
    }

    #[test]
    fn count_reconciliation_posts_exactly_one_correction() {
        // System 85 at (product, batch, location); counted 80; finalize posts
        // one count-correction of 5 and the allocation lands on 80.
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        let product_id = ProductId::new();
        let batch_id = fx.receive(product_id, 100, l1);
        fx.ledger
            .record(MovementRequest {
                actor_id: ActorId::new(),
                occurred_at: as_of(),
                reason_code: "order".to_string(),
                reference_document: None,
                kind: RequestKind::Pick {
                    product_id,
                    source: PickSource::Fefo,
                    quantity: Quantity::new(15),
                },
            })
            .unwrap();

        let count = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        let started = fx.engine.start(count.id).unwrap();
        assert_eq!(started.status, CountStatus::InProgress);
        assert_eq!(started.items.len(), 1);
        let item = &started.items[0];
        assert_eq!(item.system_quantity, Quantity::new(85));

        let recorded = fx
            .engine
            .record_count(count.id, item.id, Quantity::new(80), ActorId::new())
            .unwrap();
        assert_eq!(recorded.status, ItemStatus::Discrepant);
        assert_eq!(recorded.difference(), Some(-5));

        let report = fx
            .engine
            .finalize(count.id, ActorId::new(), as_of())
            .unwrap();
        assert_eq!(report.status, CountStatus::Completed);
        assert_eq!(report.discrepancies, 1);
        assert_eq!(report.accuracy_percent, 0.0);

        let corrections = fx
            .ledger
            .movements(&MovementFilter::default())
            .unwrap()
            .into_iter()
            .filter(|m| matches!(m.kind, MovementKind::CountCorrection { .. }))
            .collect::<Vec<_>>();
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].quantity, Quantity::new(5));
        assert_eq!(corrections[0].from_location, Some(l1));
        match corrections[0].kind {
            MovementKind::CountCorrection { count_id } => assert_eq!(count_id, count.id),
            _ => unreachable!(),
        }

        assert_eq!(
            fx.ledger.allocations_at(l1).unwrap(),
            vec![(batch_id, Quantity::new(80))]
        );
        assert_eq!(
            fx.ledger.batch(batch_id).unwrap().available_quantity(),
            Quantity::new(80)
        );
    }

    #[test]
    fn overage_becomes_a_correction_in() {
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        let product_id = ProductId::new();
        let batch_id = fx.receive(product_id, 100, l1);
        fx.ledger
            .record(MovementRequest {
                actor_id: ActorId::new(),
                occurred_at: as_of(),
                reason_code: "order".to_string(),
                reference_document: None,
                kind: RequestKind::Pick {
                    product_id,
                    source: PickSource::Fefo,
                    quantity: Quantity::new(30),
                },
            })
            .unwrap();

        let count = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        let started = fx.engine.start(count.id).unwrap();
        let item = &started.items[0];
        assert_eq!(item.system_quantity, Quantity::new(70));

        // Five units found that the system had lost track of.
        fx.engine
            .record_count(count.id, item.id, Quantity::new(75), ActorId::new())
            .unwrap();
        fx.engine
            .finalize(count.id, ActorId::new(), as_of())
            .unwrap();

        assert_eq!(
            fx.ledger.batch(batch_id).unwrap().available_quantity(),
            Quantity::new(75)
        );
        assert_eq!(
            fx.ledger.allocations_at(l1).unwrap(),
            vec![(batch_id, Quantity::new(75))]
        );
    }

    #[test]
    fn matched_items_post_no_corrections() {
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        let product_id = ProductId::new();
        fx.receive(product_id, 40, l1);

        let count = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        let started = fx.engine.start(count.id).unwrap();
        let before = fx.ledger.log_len().unwrap();

        fx.engine
            .record_count(count.id, started.items[0].id, Quantity::new(40), ActorId::new())
            .unwrap();
        let report = fx
            .engine
            .finalize(count.id, ActorId::new(), as_of())
            .unwrap();

        assert_eq!(report.accuracy_percent, 100.0);
        assert_eq!(report.discrepancies, 0);
        assert_eq!(fx.ledger.log_len().unwrap(), before);
    }

    #[test]
    fn start_requires_scheduled_status() {
        let fx = Fixture::new();
        let count = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        fx.engine.start(count.id).unwrap();

        let err = fx.engine.start(count.id).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(StockError::AlreadyStarted { .. })
        ));
    }

    #[test]
    fn overlapping_scopes_cannot_run_concurrently() {
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        let product_id = ProductId::new();
        fx.receive(product_id, 10, l1);

        let first = fx
            .engine
            .schedule(CountScope::warehouse(fx.warehouse), date(2024, 6, 20), ActorId::new())
            .unwrap();
        fx.engine.start(first.id).unwrap();

        let second = fx
            .engine
            .schedule(
                CountScope {
                    warehouse_id: Some(fx.warehouse),
                    product_ids: Some([product_id].into_iter().collect()),
                },
                date(2024, 6, 21),
                ActorId::new(),
            )
            .unwrap();
        let err = fx.engine.start(second.id).unwrap_err();
        match err {
            LedgerError::Domain(StockError::CountScopeConflict { existing }) => {
                assert_eq!(existing, first.id);
            }
            other => panic!("expected CountScopeConflict, got {other:?}"),
        }

        // A disjoint warehouse may count in parallel.
        let elsewhere = fx
            .engine
            .schedule(CountScope::warehouse(WarehouseId::new()), date(2024, 6, 21), ActorId::new())
            .unwrap();
        fx.engine.start(elsewhere.id).unwrap();

        // And once the first completes, the blocked scope may start.
        fx.engine
            .record_count(
                first.id,
                fx.engine.get(first.id).unwrap().items[0].id,
                Quantity::new(10),
                ActorId::new(),
            )
            .unwrap();
        fx.engine.finalize(first.id, ActorId::new(), as_of()).unwrap();
        fx.engine.start(second.id).unwrap();
    }

    #[test]
    fn record_count_is_one_shot_per_item() {
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        fx.receive(ProductId::new(), 25, l1);

        let count = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        let started = fx.engine.start(count.id).unwrap();
        let item_id = started.items[0].id;

        fx.engine
            .record_count(count.id, item_id, Quantity::new(20), ActorId::new())
            .unwrap();
        // Same value: idempotent.
        fx.engine
            .record_count(count.id, item_id, Quantity::new(20), ActorId::new())
            .unwrap();
        // Different value: rejected.
        let err = fx
            .engine
            .record_count(count.id, item_id, Quantity::new(21), ActorId::new())
            .unwrap_err();
        match err {
            LedgerError::Domain(StockError::AlreadyCounted {
                recorded,
                attempted,
                ..
            }) => {
                assert_eq!(recorded, Quantity::new(20));
                assert_eq!(attempted, Quantity::new(21));
            }
            other => panic!("expected AlreadyCounted, got {other:?}"),
        }
    }

    #[test]
    fn finalize_requires_every_item_counted() {
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        let l2 = fx.slot("B", 200);
        let product_id = ProductId::new();
        fx.receive(product_id, 10, l1);
        fx.receive(product_id, 20, l2);

        let count = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        let started = fx.engine.start(count.id).unwrap();
        assert_eq!(started.items.len(), 2);

        fx.engine
            .record_count(count.id, started.items[0].id, Quantity::new(10), ActorId::new())
            .unwrap();

        let err = fx
            .engine
            .finalize(count.id, ActorId::new(), as_of())
            .unwrap_err();
        match err {
            LedgerError::Domain(StockError::IncompleteCount { pending, total, .. }) => {
                assert_eq!(pending, 1);
                assert_eq!(total, 2);
            }
            other => panic!("expected IncompleteCount, got {other:?}"),
        }
        assert_eq!(fx.engine.get(count.id).unwrap().status, CountStatus::InProgress);
    }

    #[test]
    fn scope_filters_the_snapshot() {
        let fx = Fixture::new();
        let l1 = fx.slot("A", 200);
        let product_a = ProductId::new();
        let product_b = ProductId::new();
        fx.receive(product_a, 10, l1);
        fx.receive(product_b, 20, l1);

        let count = fx
            .engine
            .schedule(CountScope::products([product_a]), date(2024, 6, 20), ActorId::new())
            .unwrap();
        let started = fx.engine.start(count.id).unwrap();
        assert_eq!(started.items.len(), 1);
        assert_eq!(started.items[0].product_id, product_a);
    }

    #[test]
    fn cancel_releases_the_scope_and_terminal_counts_reject_it() {
        let fx = Fixture::new();
        let first = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 20), ActorId::new())
            .unwrap();
        fx.engine.start(first.id).unwrap();
        fx.engine.cancel(first.id).unwrap();

        let second = fx
            .engine
            .schedule(CountScope::all(), date(2024, 6, 21), ActorId::new())
            .unwrap();
        fx.engine.start(second.id).unwrap();

        let err = fx.engine.cancel(first.id).unwrap_err();
        assert!(matches!(err, LedgerError::Domain(StockError::Conflict(_))));
    }
}
