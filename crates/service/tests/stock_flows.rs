//! Black-box flows through the service facade, end to end.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use stockline_batches::{LifecycleState, QualityState};
use stockline_catalog::{InMemoryCatalog, ProductRef};
use stockline_core::{ActorId, LocationId, ProductId, Quantity, StockError, WarehouseId};
use stockline_counts::CountScope;
use stockline_ledger::{
    LedgerError, MovementFilter, MovementKind, MovementLedger, PickSource, Placement,
};
use stockline_locations::Location;
use stockline_service::{FixedActor, StockConfig, StockService};

type Service = StockService<Arc<InMemoryCatalog>, FixedActor>;

struct Fixture {
    service: Service,
    catalog: Arc<InMemoryCatalog>,
    warehouse: WarehouseId,
    actor: ActorId,
}

impl Fixture {
    fn new() -> Self {
        stockline_observability::init_for_tests();
        let catalog = Arc::new(InMemoryCatalog::new());
        let actor = ActorId::new();
        let service = StockService::new(
            Arc::clone(&catalog),
            FixedActor::new(actor),
            StockConfig::default(),
        );
        Self {
            service,
            catalog,
            warehouse: WarehouseId::new(),
            actor,
        }
    }

    fn product(&self, reorder_min: u64, reorder_max: u64) -> ProductId {
        let id = ProductId::new();
        self.catalog.insert(ProductRef {
            id,
            reorder_min: Quantity::new(reorder_min),
            reorder_max: Quantity::new(reorder_max),
        });
        id
    }

    fn slot(&self, zone: &str, cap: u64) -> LocationId {
        let id = LocationId::new();
        self.service
            .add_location(
                Location::new(id, self.warehouse, zone, "01", "1", Quantity::new(cap)).unwrap(),
            )
            .unwrap();
        id
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn in_days(days: u64) -> NaiveDate {
    today().checked_add_days(Days::new(days)).unwrap()
}

fn manufactured() -> NaiveDate {
    today().checked_sub_days(Days::new(30)).unwrap()
}

#[test]
fn receive_pick_count_and_reconcile() {
    let fx = Fixture::new();
    let l1 = fx.slot("A", 120);
    let product = fx.product(10, 200);

    // Receive 100 of a batch expiring in 10 days.
    let receipt = fx
        .service
        .receive(
            product,
            manufactured(),
            Some(in_days(10)),
            QualityState::Approved,
            100,
            Placement::Explicit(l1),
            "purchase-order",
            Some("PO-1001".to_string()),
        )
        .unwrap();
    assert_eq!(receipt.actor_id, fx.actor);
    assert_eq!(receipt.to_location, Some(l1));
    let batch = receipt.batch_id;

    // Pick 30 via FEFO.
    let picks = fx
        .service
        .pick(product, 30, PickSource::Fefo, "sales-order", None)
        .unwrap();
    assert_eq!(picks.len(), 1);
    assert_eq!(picks[0].from_location, Some(l1));

    let level = fx.service.get_stock_level(product).unwrap();
    assert_eq!(level.available, Quantity::new(70));
    assert!(!level.below_reorder_min);
    assert_eq!(level.allocated_by_location.len(), 1);
    assert_eq!(level.allocated_by_location[0].quantity, Quantity::new(70));
    assert!(level.batches[0].near_expiry);

    // Count finds 65 where the system says 70.
    let count = fx
        .service
        .schedule_count(CountScope::warehouse(fx.warehouse), in_days(1))
        .unwrap();
    let started = fx.service.start_count(count.id).unwrap();
    assert_eq!(started.items.len(), 1);
    assert_eq!(started.items[0].system_quantity, Quantity::new(70));

    fx.service
        .record_count(count.id, started.items[0].id, 65)
        .unwrap();
    let report = fx.service.finalize_count(count.id).unwrap();
    assert_eq!(report.total_items, 1);
    assert_eq!(report.discrepancies, 1);
    assert_eq!(report.accuracy_percent, 0.0);

    // The correction shows up in the ledger and in the stock level.
    let corrections: Vec<_> = fx
        .service
        .list_movements(&MovementFilter {
            batch_id: Some(batch),
            ..MovementFilter::default()
        })
        .unwrap()
        .into_iter()
        .filter(|m| matches!(m.kind, MovementKind::CountCorrection { .. }))
        .collect();
    assert_eq!(corrections.len(), 1);
    assert_eq!(corrections[0].quantity, Quantity::new(5));

    let level = fx.service.get_stock_level(product).unwrap();
    assert_eq!(level.available, Quantity::new(65));

    let report_again = fx.service.get_count_report(count.id).unwrap();
    assert_eq!(report_again.discrepancies, 1);
}

#[test]
fn lifecycle_reporting_and_blocked_filtering() {
    let fx = Fixture::new();
    let _l1 = fx.slot("A", 500);
    let product = fx.product(0, 100);

    let fresh = fx
        .service
        .receive(
            product,
            manufactured(),
            Some(in_days(90)),
            QualityState::Approved,
            50,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap()
        .batch_id;
    let expiring = fx
        .service
        .receive(
            product,
            manufactured(),
            Some(in_days(5)),
            QualityState::Approved,
            50,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap()
        .batch_id;
    let quarantined = fx
        .service
        .receive(
            product,
            manufactured(),
            None,
            QualityState::Quarantined,
            50,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap()
        .batch_id;

    let fresh_view = fx.service.get_batch(fresh).unwrap();
    assert_eq!(fresh_view.state, LifecycleState::Active);
    assert!(!fresh_view.near_expiry);

    let expiring_view = fx.service.get_batch(expiring).unwrap();
    assert_eq!(expiring_view.state, LifecycleState::Active);
    assert!(expiring_view.near_expiry);

    let quarantined_view = fx.service.get_batch(quarantined).unwrap();
    assert_eq!(quarantined_view.state, LifecycleState::Blocked);

    let visible = fx
        .service
        .list_batches_for_product(product, false)
        .unwrap();
    assert_eq!(visible.len(), 2);
    assert!(visible.iter().all(|v| v.id != quarantined));

    let all = fx.service.list_batches_for_product(product, true).unwrap();
    assert_eq!(all.len(), 3);

    // FEFO never touches the quarantined batch.
    let err = fx
        .service
        .pick(product, 101, PickSource::Fefo, "sales-order", None)
        .unwrap_err();
    match err {
        LedgerError::Domain(StockError::InsufficientStock { available, .. }) => {
            assert_eq!(available, Quantity::new(100));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
}

#[test]
fn reorder_flag_follows_the_catalog_threshold() {
    let fx = Fixture::new();
    let _l1 = fx.slot("A", 500);
    let product = fx.product(50, 200);

    fx.service
        .receive(
            product,
            manufactured(),
            None,
            QualityState::Approved,
            60,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap();
    assert!(!fx.service.get_stock_level(product).unwrap().below_reorder_min);

    fx.service
        .pick(product, 20, PickSource::Fefo, "sales-order", None)
        .unwrap();
    let level = fx.service.get_stock_level(product).unwrap();
    assert_eq!(level.available, Quantity::new(40));
    assert!(level.below_reorder_min);
}

#[test]
fn near_full_locations_are_flagged() {
    let fx = Fixture::new();
    let l1 = fx.slot("A", 100);
    let l2 = fx.slot("B", 100);
    let product = fx.product(0, 0);

    fx.service
        .receive(
            product,
            manufactured(),
            None,
            QualityState::Approved,
            85,
            Placement::Explicit(l1),
            "purchase-order",
            None,
        )
        .unwrap();
    fx.service
        .receive(
            product,
            manufactured(),
            None,
            QualityState::Approved,
            20,
            Placement::Explicit(l2),
            "purchase-order",
            None,
        )
        .unwrap();

    let views = fx.service.list_locations(fx.warehouse).unwrap();
    assert_eq!(views.len(), 2);
    let v1 = views.iter().find(|v| v.id == l1).unwrap();
    let v2 = views.iter().find(|v| v.id == l2).unwrap();
    assert!(v1.near_full);
    assert_eq!(v1.occupancy_ratio, 0.85);
    assert!(!v2.near_full);

    let single = fx.service.get_location(l2).unwrap();
    assert_eq!(single.occupied, Quantity::new(20));
    assert_eq!(single.position_code, "B01-1");
}

#[test]
fn movement_listing_is_ordered_and_restartable() {
    let fx = Fixture::new();
    let _l1 = fx.slot("A", 1000);
    let product = fx.product(0, 0);

    for _ in 0..5 {
        fx.service
            .receive(
                product,
                manufactured(),
                None,
                QualityState::Approved,
                10,
                Placement::Auto(fx.warehouse),
                "purchase-order",
                None,
            )
            .unwrap();
    }

    let all = fx.service.list_movements(&MovementFilter::default()).unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].sequence < w[1].sequence));

    let rest = fx
        .service
        .list_movements(&MovementFilter {
            after_sequence: Some(all[2].sequence),
            ..MovementFilter::default()
        })
        .unwrap();
    assert_eq!(rest.len(), 2);
}

#[test]
fn unknown_products_are_rejected_at_the_boundary() {
    let fx = Fixture::new();
    let _l1 = fx.slot("A", 100);

    let err = fx
        .service
        .receive(
            ProductId::new(),
            manufactured(),
            None,
            QualityState::Approved,
            10,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Domain(StockError::NotFound { kind: "product", .. })
    ));

    let err = fx
        .service
        .receive(
            fx.product(0, 0),
            manufactured(),
            None,
            QualityState::Approved,
            0,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Domain(StockError::InvalidQuantity { .. })
    ));
}

#[test]
fn rebuilt_ledger_serves_identical_stock_levels() {
    let fx = Fixture::new();
    let _l1 = fx.slot("A", 500);
    let product = fx.product(0, 0);

    fx.service
        .receive(
            product,
            manufactured(),
            Some(in_days(20)),
            QualityState::Approved,
            100,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap();
    fx.service
        .pick(product, 35, PickSource::Fefo, "sales-order", None)
        .unwrap();

    let log = fx.service.list_movements(&MovementFilter::default()).unwrap();
    let locations = fx
        .service
        .ledger()
        .locations_for_warehouse(fx.warehouse)
        .unwrap();

    let rebuilt = MovementLedger::rebuild(locations, &log).unwrap();
    let restored: Service = StockService::with_ledger(
        Arc::clone(&fx.catalog),
        FixedActor::new(fx.actor),
        StockConfig::default(),
        Arc::new(rebuilt),
    );

    let before = fx.service.get_stock_level(product).unwrap();
    let after = restored.get_stock_level(product).unwrap();
    assert_eq!(before.available, after.available);
    assert_eq!(before.allocated_by_location, after.allocated_by_location);
}

#[test]
fn cancelled_counts_release_their_scope() {
    let fx = Fixture::new();
    let _l1 = fx.slot("A", 100);
    let product = fx.product(0, 0);
    fx.service
        .receive(
            product,
            manufactured(),
            None,
            QualityState::Approved,
            10,
            Placement::Auto(fx.warehouse),
            "purchase-order",
            None,
        )
        .unwrap();

    let first = fx
        .service
        .schedule_count(CountScope::all(), in_days(1))
        .unwrap();
    fx.service.start_count(first.id).unwrap();

    let second = fx
        .service
        .schedule_count(CountScope::all(), in_days(2))
        .unwrap();
    let err = fx.service.start_count(second.id).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Domain(StockError::CountScopeConflict { .. })
    ));

    fx.service.cancel_count(first.id).unwrap();
    fx.service.start_count(second.id).unwrap();
    assert_eq!(
        fx.service.get_count(second.id).unwrap().items.len(),
        1
    );
}
