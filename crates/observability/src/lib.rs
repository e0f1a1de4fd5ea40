//! Tracing/logging initialization for binaries and tests.

pub mod tracing;

pub use tracing::{init, init_for_tests};
