//! Stock store boundary.
//!
//! This module defines the storage abstraction the engines commit through,
//! plus an in-memory implementation for tests/embedded use and a Postgres
//! implementation for persistent deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{Committed, MovementMeta, StockStore, StockUpdate, StoreError};
