//! Stock ledger domain module.
//!
//! This crate contains the business rules for stock lines and their movement
//! history, implemented purely as deterministic domain logic (no IO, no
//! storage, no locking). The infrastructure crate applies the decisions made
//! here inside a commit boundary.

pub mod event;
pub mod location;
pub mod movement;
pub mod mutation;
pub mod stock;
pub mod transaction;

pub use event::{StockChanged, StockCreated, StockEvent, StockMoved, StockRolledBack};
pub use location::{Location, LocationRef};
pub use movement::{
    CHANGE_REASON, FIRST_RECORD_REASON, Movement, MovementRef, NewMovement, reason_or_default,
    reconstruct,
};
pub use mutation::{
    ChangeKind, Decision, QuantityUpdate, StockChange, decide_put, decide_rollback, decide_take,
    has_enough_stock, plan_update,
};
pub use stock::{NewStock, Placement, StockLine, StockRecord};
pub use transaction::Transaction;
