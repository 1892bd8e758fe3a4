use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{Cost, ExpectedVersion, ItemId, LocationId, MovementId, Quantity, StockId, UserId};
use stockledger_inventory::{Movement, NewMovement, NewStock, StockRecord};

/// Stock store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, invariants). The engine wraps them in
/// `LedgerError::Commit` so callers keep the original cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The stored version no longer matches the version the caller loaded.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A uniqueness constraint rejected the write (one stock per item and location).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The write was malformed (movement for another stock, broken before-chain).
    #[error("invalid write: {0}")]
    InvalidWrite(String),

    /// Connection, pool, decoding or lock failures.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Metadata for the first movement written when a stock line is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementMeta {
    pub reason: String,
    pub cost: Cost,
    pub created_by: Option<UserId>,
}

/// A single atomic write against one stock line.
///
/// The store applies `quantity` and `location_id`, bumps the version and
/// appends `movement` (when present) in one step, or does nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockUpdate {
    pub stock_id: StockId,
    pub expected_version: ExpectedVersion,
    pub quantity: Quantity,
    pub location_id: LocationId,
    pub movement: Option<NewMovement>,
}

/// Result of a successful write: the new record state and the movement the
/// store appended, with its assigned id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub stock: StockRecord,
    pub movement: Option<Movement>,
}

/// Storage boundary for stock lines and their movement history.
///
/// Implementations must:
/// - assign strictly increasing movement ids at commit time
/// - reject a commit whose `expected_version` does not match
/// - keep (item, location) unique across stock lines
/// - apply each `insert_stock`/`commit` atomically
pub trait StockStore: Send + Sync {
    /// Create a stock line together with its first movement (0 -> quantity).
    fn insert_stock(&self, stock: NewStock, first: MovementMeta) -> Result<Committed, StoreError>;

    fn load_stock(&self, stock_id: StockId) -> Result<Option<StockRecord>, StoreError>;

    fn find_stock(&self, item_id: ItemId, location_id: LocationId) -> Result<Option<StockRecord>, StoreError>;

    /// All stock lines of an item, ordered by stock id.
    fn stocks_for_item(&self, item_id: ItemId) -> Result<Vec<StockRecord>, StoreError>;

    fn commit(&self, update: StockUpdate) -> Result<Committed, StoreError>;

    /// Full history in ascending id order.
    fn movements(&self, stock_id: StockId) -> Result<Vec<Movement>, StoreError>;

    fn movement(&self, stock_id: StockId, movement_id: MovementId) -> Result<Option<Movement>, StoreError>;

    fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, StoreError>;

    /// Movements with `id >= from`, newest first.
    fn movements_from(&self, stock_id: StockId, from: MovementId) -> Result<Vec<Movement>, StoreError>;

    /// Remove a stock line and its whole history.
    fn delete_stock(&self, stock_id: StockId) -> Result<(), StoreError>;
}

impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    fn insert_stock(&self, stock: NewStock, first: MovementMeta) -> Result<Committed, StoreError> {
        (**self).insert_stock(stock, first)
    }

    fn load_stock(&self, stock_id: StockId) -> Result<Option<StockRecord>, StoreError> {
        (**self).load_stock(stock_id)
    }

    fn find_stock(&self, item_id: ItemId, location_id: LocationId) -> Result<Option<StockRecord>, StoreError> {
        (**self).find_stock(item_id, location_id)
    }

    fn stocks_for_item(&self, item_id: ItemId) -> Result<Vec<StockRecord>, StoreError> {
        (**self).stocks_for_item(item_id)
    }

    fn commit(&self, update: StockUpdate) -> Result<Committed, StoreError> {
        (**self).commit(update)
    }

    fn movements(&self, stock_id: StockId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements(stock_id)
    }

    fn movement(&self, stock_id: StockId, movement_id: MovementId) -> Result<Option<Movement>, StoreError> {
        (**self).movement(stock_id, movement_id)
    }

    fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, StoreError> {
        (**self).last_movement(stock_id)
    }

    fn movements_from(&self, stock_id: StockId, from: MovementId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_from(stock_id, from)
    }

    fn delete_stock(&self, stock_id: StockId) -> Result<(), StoreError> {
        (**self).delete_stock(stock_id)
    }
}
