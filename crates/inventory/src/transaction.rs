use serde::{Deserialize, Serialize};

use stockledger_core::{Quantity, StockId, UserId};

/// Unsaved workflow transaction bound to a stock line.
///
/// The transaction state machine lives outside the ledger; this is only the
/// starting record it is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub stock_id: StockId,
    pub name: String,
    pub quantity: Quantity,
    pub created_by: Option<UserId>,
}

impl Transaction {
    pub fn new(stock_id: StockId, name: impl Into<String>) -> Self {
        Self {
            stock_id,
            name: name.into(),
            quantity: Quantity::ZERO,
            created_by: None,
        }
    }

    pub fn created_by(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }
}
