//! Infrastructure layer: stores, locking and the engines that commit stock
//! changes.
//!
//! The domain crate decides what a change is; this crate makes it durable
//! (store commit), serializes writers (per-stock locks) and notifies
//! subscribers once the change is committed.

pub mod engine;
pub mod error;
pub mod item_stocks;
pub mod ledger;
pub mod locations;
pub mod locks;
pub mod store;

pub use engine::{MutationEngine, RollbackEngine, RollbackOutcome};
pub use error::LedgerError;
pub use item_stocks::ItemStocks;
pub use ledger::MovementLedger;
pub use locations::{LocationRegistry, LocationResolver};
pub use locks::StockLocks;
pub use store::{
    Committed, InMemoryStockStore, MovementMeta, PostgresStockStore, StockStore, StockUpdate,
    StoreError,
};

#[cfg(test)]
mod integration_tests;
