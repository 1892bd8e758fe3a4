//! `stockledger-core` — shared building blocks for the stock ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, quantities, the domain error taxonomy and ledger configuration.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod id;
pub mod quantity;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use config::{ConfigError, LedgerConfig};
pub use error::{StockError, StockResult};
pub use id::{ItemId, LocationId, MovementId, StockId, UserId};
pub use quantity::{Cost, NumericInput, Quantity};
