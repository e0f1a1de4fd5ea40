//! `stockline-service` — the in-process boundary of the inventory core.
//!
//! [`StockService`] wires the catalog, the movement ledger and the cycle
//! count engine behind one facade, stamps every operation with the current
//! actor, and exposes the read models the surrounding UI/report layers
//! render. No wire format is mandated; embed it in-process.

pub mod actor;
pub mod config;
pub mod service;
pub mod views;

pub use actor::{ActorProvider, FixedActor};
pub use config::StockConfig;
pub use service::StockService;
pub use views::{BatchView, LocationStock, LocationView, StockLevel};
