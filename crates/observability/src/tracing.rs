//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for an embedding process.
///
/// JSON output, `RUST_LOG`-configurable, defaulting to `stockline=info`.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockline=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Compact, human-readable init for test binaries. No-op if a subscriber is
/// already installed.
pub fn init_for_tests() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockline=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_test_writer()
        .try_init();
}
