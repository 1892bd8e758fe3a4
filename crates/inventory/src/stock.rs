use serde::{Deserialize, Serialize};

use stockledger_core::{AggregateRoot, ItemId, LocationId, Quantity, StockId};

use crate::transaction::Transaction;

/// Free-text shelf placement of a stock line. No invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub aisle: Option<String>,
    pub row: Option<String>,
    pub bin: Option<String>,
}

impl Placement {
    pub fn new(
        aisle: impl Into<Option<String>>,
        row: impl Into<Option<String>>,
        bin: impl Into<Option<String>>,
    ) -> Self {
        Self {
            aisle: aisle.into(),
            row: row.into(),
            bin: bin.into(),
        }
    }
}

/// What the ledger needs from a stock line to decide a mutation.
pub trait StockLine {
    fn stock_id(&self) -> StockId;

    fn current_quantity(&self) -> Quantity;

    fn location(&self) -> LocationId;
}

/// Aggregate root: the live quantity of one item at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    id: StockId,
    item_id: ItemId,
    location_id: LocationId,
    quantity: Quantity,
    placement: Placement,
    version: u64,
}

impl StockRecord {
    /// Rehydrate a record from storage.
    pub fn from_parts(
        id: StockId,
        item_id: ItemId,
        location_id: LocationId,
        quantity: Quantity,
        placement: Placement,
        version: u64,
    ) -> Self {
        Self {
            id,
            item_id,
            location_id,
            quantity,
            placement,
            version,
        }
    }

    pub fn id_typed(&self) -> StockId {
        self.id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn location_id(&self) -> LocationId {
        self.location_id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Creates an unsaved transaction bound to this stock line.
    pub fn new_transaction(&self, name: impl Into<String>) -> Transaction {
        Transaction::new(self.id, name)
    }
}

impl StockLine for StockRecord {
    fn stock_id(&self) -> StockId {
        self.id
    }

    fn current_quantity(&self) -> Quantity {
        self.quantity
    }

    fn location(&self) -> LocationId {
        self.location_id
    }
}

impl AggregateRoot for StockRecord {
    type Id = StockId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// A stock line that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStock {
    pub item_id: ItemId,
    pub location_id: LocationId,
    pub quantity: Quantity,
    pub placement: Placement,
}
