use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use stockline_batches::{classify, QualityState};
use stockline_catalog::{ProductCatalog, ProductRef};
use stockline_core::{
    BatchId, CountId, CountItemId, LocationId, ProductId, Quantity, StockError, StockResult,
    WarehouseId,
};
use stockline_counts::{CountItem, CountReport, CountScope, CycleCountEngine, InventoryCount};
use stockline_ledger::{
    AdjustmentDirection, LedgerError, LedgerResult, MovementFilter, MovementLedger,
    MovementRequest, PickSource, Placement, RequestKind, StockMovement,
};
use stockline_locations::Location;

use crate::actor::ActorProvider;
use crate::config::StockConfig;
use crate::views::{BatchView, LocationStock, LocationView, StockLevel};

/// The inventory core behind one facade.
///
/// Every mutation funnels through the ledger; every operation is stamped
/// with the current actor and the wall-clock time (the only place the clock
/// is read).
pub struct StockService<C, A> {
    catalog: C,
    actors: A,
    config: StockConfig,
    ledger: Arc<MovementLedger>,
    counts: CycleCountEngine,
}

impl<C, A> StockService<C, A>
where
    C: ProductCatalog,
    A: ActorProvider,
{
    pub fn new(catalog: C, actors: A, config: StockConfig) -> Self {
        Self::with_ledger(catalog, actors, config, Arc::new(MovementLedger::new()))
    }

    /// Wire around an existing ledger (e.g. one rebuilt from a movement log).
    pub fn with_ledger(
        catalog: C,
        actors: A,
        config: StockConfig,
        ledger: Arc<MovementLedger>,
    ) -> Self {
        let counts = CycleCountEngine::new(Arc::clone(&ledger));
        Self {
            catalog,
            actors,
            config,
            ledger,
            counts,
        }
    }

    pub fn config(&self) -> &StockConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<MovementLedger> {
        &self.ledger
    }

    fn request(
        &self,
        reason_code: &str,
        reference_document: Option<String>,
        kind: RequestKind,
    ) -> MovementRequest {
        MovementRequest {
            actor_id: self.actors.current_actor(),
            occurred_at: Utc::now(),
            reason_code: reason_code.to_string(),
            reference_document,
            kind,
        }
    }

    fn require_product(&self, product_id: ProductId) -> StockResult<ProductRef> {
        self.catalog
            .get_product(product_id)
            .ok_or_else(|| StockError::not_found("product", product_id))
    }

    fn single(mut movements: Vec<StockMovement>) -> LedgerResult<StockMovement> {
        movements
            .pop()
            .ok_or_else(|| LedgerError::Store("ledger returned no movement".to_string()))
    }

    // ---- warehouse configuration ----

    pub fn add_location(&self, location: Location) -> LedgerResult<()> {
        self.ledger.add_location(location)
    }

    // ---- movements ----

    /// Receive a new batch of `product_id` into a slot (explicit or
    /// auto-placed). Returns the recorded receipt movement.
    #[allow(clippy::too_many_arguments)]
    pub fn receive(
        &self,
        product_id: ProductId,
        manufactured_on: NaiveDate,
        expires_on: Option<NaiveDate>,
        quality_state: QualityState,
        quantity: u64,
        placement: Placement,
        reason_code: &str,
        reference_document: Option<String>,
    ) -> LedgerResult<StockMovement> {
        let quantity = Quantity::positive(quantity)?;
        self.require_product(product_id)?;
        let movements = self.ledger.record(self.request(
            reason_code,
            reference_document,
            RequestKind::Receipt {
                product_id,
                manufactured_on,
                expires_on,
                quality_state,
                quantity,
                placement,
            },
        ))?;
        Self::single(movements)
    }

    /// Pick stock, either from a fixed batch/slot or via FEFO. A FEFO pick
    /// spanning batches returns one movement per consumed segment.
    pub fn pick(
        &self,
        product_id: ProductId,
        quantity: u64,
        source: PickSource,
        reason_code: &str,
        reference_document: Option<String>,
    ) -> LedgerResult<Vec<StockMovement>> {
        let quantity = Quantity::positive(quantity)?;
        self.require_product(product_id)?;
        self.ledger.record(self.request(
            reason_code,
            reference_document,
            RequestKind::Pick {
                product_id,
                source,
                quantity,
            },
        ))
    }

    pub fn transfer(
        &self,
        batch_id: BatchId,
        from_location: LocationId,
        to_location: LocationId,
        quantity: u64,
        reason_code: &str,
    ) -> LedgerResult<StockMovement> {
        let quantity = Quantity::positive(quantity)?;
        let movements = self.ledger.record(self.request(
            reason_code,
            None,
            RequestKind::Transfer {
                batch_id,
                from_location,
                to_location,
                quantity,
            },
        ))?;
        Self::single(movements)
    }

    pub fn adjust(
        &self,
        batch_id: BatchId,
        location_id: LocationId,
        direction: AdjustmentDirection,
        quantity: u64,
        reason_code: &str,
    ) -> LedgerResult<StockMovement> {
        let quantity = Quantity::positive(quantity)?;
        let movements = self.ledger.record(self.request(
            reason_code,
            None,
            RequestKind::Adjustment {
                batch_id,
                location_id,
                direction,
                quantity,
            },
        ))?;
        Self::single(movements)
    }

    pub fn set_quality_state(
        &self,
        batch_id: BatchId,
        quality: QualityState,
    ) -> LedgerResult<QualityState> {
        self.ledger.set_quality_state(batch_id, quality)
    }

    // ---- stock queries ----

    pub fn get_stock_level(&self, product_id: ProductId) -> LedgerResult<StockLevel> {
        let product = self.require_product(product_id)?;
        let as_of = Utc::now();
        let policy = self.config.expiry_policy();

        let batches = self.ledger.batches_for_product(product_id)?;
        let available: Quantity = batches.iter().map(|b| b.available_quantity()).sum();

        let mut per_location: BTreeMap<LocationId, Quantity> = BTreeMap::new();
        for batch in &batches {
            for (location_id, quantity) in self.ledger.allocations_for_batch(batch.id())? {
                let slot = per_location.entry(location_id).or_insert(Quantity::ZERO);
                *slot = slot.checked_add(quantity).unwrap_or(*slot);
            }
        }

        Ok(StockLevel {
            product_id,
            available,
            below_reorder_min: available < product.reorder_min,
            allocated_by_location: per_location
                .into_iter()
                .map(|(location_id, quantity)| LocationStock {
                    location_id,
                    quantity,
                })
                .collect(),
            batches: batches
                .iter()
                .map(|b| BatchView::new(b, classify(b, as_of, policy)))
                .collect(),
        })
    }

    pub fn get_batch(&self, batch_id: BatchId) -> LedgerResult<BatchView> {
        let batch = self.ledger.batch(batch_id)?;
        let standing = classify(&batch, Utc::now(), self.config.expiry_policy());
        Ok(BatchView::new(&batch, standing))
    }

    /// Batches of a product; blocked ones are hidden unless asked for.
    pub fn list_batches_for_product(
        &self,
        product_id: ProductId,
        include_blocked: bool,
    ) -> LedgerResult<Vec<BatchView>> {
        let as_of = Utc::now();
        let policy = self.config.expiry_policy();
        Ok(self
            .ledger
            .batches_for_product(product_id)?
            .iter()
            .map(|b| BatchView::new(b, classify(b, as_of, policy)))
            .filter(|view| include_blocked || !view.quality_state.is_blocked())
            .collect())
    }

    pub fn get_location(&self, location_id: LocationId) -> LedgerResult<LocationView> {
        let location = self.ledger.location(location_id)?;
        let occupied: Quantity = self
            .ledger
            .allocations_at(location_id)?
            .into_iter()
            .map(|(_, q)| q)
            .sum();
        Ok(LocationView::new(
            &location,
            occupied,
            self.config.near_full_ratio,
        ))
    }

    pub fn list_locations(&self, warehouse_id: WarehouseId) -> LedgerResult<Vec<LocationView>> {
        self.ledger
            .locations_for_warehouse(warehouse_id)?
            .iter()
            .map(|location| {
                let occupied: Quantity = self
                    .ledger
                    .allocations_at(location.id())?
                    .into_iter()
                    .map(|(_, q)| q)
                    .sum();
                Ok(LocationView::new(
                    location,
                    occupied,
                    self.config.near_full_ratio,
                ))
            })
            .collect()
    }

    /// Ordered, append-only movement listing; restart with
    /// `filter.after_sequence`.
    pub fn list_movements(&self, filter: &MovementFilter) -> LedgerResult<Vec<StockMovement>> {
        self.ledger.movements(filter)
    }

    // ---- cycle counts ----

    pub fn schedule_count(
        &self,
        scope: CountScope,
        scheduled_for: NaiveDate,
    ) -> LedgerResult<InventoryCount> {
        self.counts
            .schedule(scope, scheduled_for, self.actors.current_actor())
    }

    pub fn start_count(&self, count_id: CountId) -> LedgerResult<InventoryCount> {
        self.counts.start(count_id)
    }

    /// Counted quantity may be zero (an empty slot is a valid finding).
    pub fn record_count(
        &self,
        count_id: CountId,
        item_id: CountItemId,
        counted_quantity: u64,
    ) -> LedgerResult<CountItem> {
        self.counts.record_count(
            count_id,
            item_id,
            Quantity::new(counted_quantity),
            self.actors.current_actor(),
        )
    }

    pub fn finalize_count(&self, count_id: CountId) -> LedgerResult<CountReport> {
        self.counts
            .finalize(count_id, self.actors.current_actor(), Utc::now())
    }

    pub fn cancel_count(&self, count_id: CountId) -> LedgerResult<InventoryCount> {
        self.counts.cancel(count_id)
    }

    pub fn get_count(&self, count_id: CountId) -> LedgerResult<InventoryCount> {
        self.counts.get(count_id)
    }

    pub fn get_count_report(&self, count_id: CountId) -> LedgerResult<CountReport> {
        self.counts.report(count_id)
    }
}
