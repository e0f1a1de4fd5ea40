use stockline_batches::ExpiryPolicy;

/// Runtime configuration for the inventory core.
///
/// Resolved once at service construction; both knobs are reporting policy,
/// not correctness invariants, so changing them needs no migration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockConfig {
    /// Batches expiring within this many days are reported near-expiry.
    pub near_expiry_days: u32,
    /// Locations at or above this occupancy ratio are reported near-full.
    pub near_full_ratio: f64,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            near_expiry_days: 30,
            near_full_ratio: 0.8,
        }
    }
}

impl StockConfig {
    /// Resolve from the environment, falling back to defaults field by field.
    ///
    /// `STOCKLINE_NEAR_EXPIRY_DAYS` and `STOCKLINE_NEAR_FULL_RATIO`;
    /// unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("STOCKLINE_NEAR_EXPIRY_DAYS") {
            match raw.parse::<u32>() {
                Ok(days) => config.near_expiry_days = days,
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring invalid STOCKLINE_NEAR_EXPIRY_DAYS")
                }
            }
        }
        if let Ok(raw) = std::env::var("STOCKLINE_NEAR_FULL_RATIO") {
            match raw.parse::<f64>() {
                Ok(ratio) if (0.0..=1.0).contains(&ratio) => config.near_full_ratio = ratio,
                _ => tracing::warn!(value = %raw, "ignoring invalid STOCKLINE_NEAR_FULL_RATIO"),
            }
        }

        config
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            warning_days: self.near_expiry_days,
        }
    }
}
