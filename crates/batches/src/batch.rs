use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{BatchId, ProductId, Quantity};

/// Quality disposition of a batch. Anything other than `Approved` freezes
/// the batch from picks without touching its quantities.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityState {
    Approved,
    Quarantined,
    Rejected,
}

impl QualityState {
    pub fn is_blocked(self) -> bool {
        !matches!(self, QualityState::Approved)
    }
}

impl core::fmt::Display for QualityState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            QualityState::Approved => "approved",
            QualityState::Quarantined => "quarantined",
            QualityState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Derived lifecycle state. Computed on read, never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Depleted,
    Expired,
    Blocked,
}

/// Configurable expiry classification policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    /// Batches expiring within this many days are reported as near-expiry.
    pub warning_days: u32,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self { warning_days: 30 }
    }
}

/// What a reader sees for a batch at a reference time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStanding {
    pub state: LifecycleState,
    /// Only ever set for `Active` batches with an expiry inside the warning window.
    pub near_expiry: bool,
}

/// One receipt of a product with shared manufacture/expiry metadata.
///
/// `received_quantity` is immutable once set; `available_quantity` moves only
/// through ledger application and satisfies `0 <= available <= received`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    id: BatchId,
    product_id: ProductId,
    manufactured_on: NaiveDate,
    expires_on: Option<NaiveDate>,
    received_quantity: Quantity,
    available_quantity: Quantity,
    quality_state: QualityState,
}

impl Batch {
    /// Construct a batch as of its receipt: fully available.
    pub fn received(
        id: BatchId,
        product_id: ProductId,
        manufactured_on: NaiveDate,
        expires_on: Option<NaiveDate>,
        quantity: Quantity,
        quality_state: QualityState,
    ) -> Self {
        Self {
            id,
            product_id,
            manufactured_on,
            expires_on,
            received_quantity: quantity,
            available_quantity: quantity,
            quality_state,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn manufactured_on(&self) -> NaiveDate {
        self.manufactured_on
    }

    pub fn expires_on(&self) -> Option<NaiveDate> {
        self.expires_on
    }

    pub fn received_quantity(&self) -> Quantity {
        self.received_quantity
    }

    pub fn available_quantity(&self) -> Quantity {
        self.available_quantity
    }

    pub fn quality_state(&self) -> QualityState {
        self.quality_state
    }

    pub fn is_expired(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_on
            .is_some_and(|expiry| expiry < as_of.date_naive())
    }

    /// FEFO sort key: expiry ascending with `None` last, then manufacture
    /// ascending, then id for a total order.
    pub fn fefo_key(&self) -> (NaiveDate, NaiveDate, BatchId) {
        // Batches without an expiry sort after every dated one.
        (
            self.expires_on.unwrap_or(NaiveDate::MAX),
            self.manufactured_on,
            self.id,
        )
    }

    pub(crate) fn set_quality_state(&mut self, state: QualityState) {
        self.quality_state = state;
    }

    pub(crate) fn apply_decrease(&mut self, quantity: Quantity) {
        debug_assert!(quantity <= self.available_quantity);
        self.available_quantity = self.available_quantity.saturating_sub(quantity);
    }

    pub(crate) fn apply_increase(&mut self, quantity: Quantity) {
        let next = self
            .available_quantity
            .checked_add(quantity)
            .unwrap_or(self.received_quantity);
        debug_assert!(next <= self.received_quantity);
        self.available_quantity = next.min(self.received_quantity);
    }
}

/// Recompute lifecycle state from quantities, expiry and quality against a
/// reference time. Pure; called on every read.
///
/// Precedence when the conditions overlap: depleted, then blocked, then
/// expired. A quarantined batch stays `Blocked` even once past expiry.
pub fn classify(batch: &Batch, as_of: DateTime<Utc>, policy: ExpiryPolicy) -> BatchStanding {
    if batch.available_quantity().is_zero() {
        return BatchStanding {
            state: LifecycleState::Depleted,
            near_expiry: false,
        };
    }
    if batch.quality_state().is_blocked() {
        return BatchStanding {
            state: LifecycleState::Blocked,
            near_expiry: false,
        };
    }
    if batch.is_expired(as_of) {
        return BatchStanding {
            state: LifecycleState::Expired,
            near_expiry: false,
        };
    }

    let near_expiry = batch.expires_on().is_some_and(|expiry| {
        let horizon = as_of
            .date_naive()
            .checked_add_days(Days::new(u64::from(policy.warning_days)))
            .unwrap_or(NaiveDate::MAX);
        expiry <= horizon
    });

    BatchStanding {
        state: LifecycleState::Active,
        near_expiry,
    }
}
