//! Domain error model.

use thiserror::Error;

use crate::id::{ItemId, LocationId, StockId};
use crate::quantity::Quantity;

/// Result type used across the domain layer.
pub type StockResult<T> = Result<T, StockError>;

/// Domain-level stock error.
///
/// Deterministic failures only (validation, invariants, unresolvable
/// references). Storage failures are reported by the infrastructure layer,
/// which wraps this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// A quantity or cost was non-numeric, unparseable or negative.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A take would drive the quantity below zero.
    #[error("not enough stock: requested {requested}, available {available}")]
    NotEnoughStock {
        requested: Quantity,
        available: Quantity,
    },

    /// A location reference could not be resolved.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// A movement reference could not be resolved for the stock.
    #[error("invalid movement: {0}")]
    InvalidMovement(String),

    /// An identifier was malformed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// No stock line exists for the requested key.
    #[error("stock not found: {0}")]
    StockNotFound(String),

    /// A stock line already exists for the item at the location.
    #[error("stock already exists for item {item} at location {location}")]
    StockAlreadyExists { item: ItemId, location: LocationId },

    /// The stock has no movements to roll back.
    #[error("stock {0} has no movements to roll back")]
    NoMovements(StockId),

    /// A mutation was attempted without an acting user while attribution is required.
    #[error("no acting user set and anonymous movements are disabled")]
    MissingActor,
}

impl StockError {
    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::InvalidLocation(msg.into())
    }

    pub fn invalid_movement(msg: impl Into<String>) -> Self {
        Self::InvalidMovement(msg.into())
    }

    pub fn stock_not_found(msg: impl Into<String>) -> Self {
        Self::StockNotFound(msg.into())
    }

    pub fn not_enough_stock(requested: Quantity, available: Quantity) -> Self {
        Self::NotEnoughStock {
            requested,
            available,
        }
    }
}
