//! Read side of the movement history.

use tracing::warn;

use stockledger_core::{Quantity, StockError, StockId};
use stockledger_inventory::{Movement, MovementRef, StockRecord, reconstruct};

use crate::error::LedgerError;
use crate::store::StockStore;

/// Append-only movement history of the stock lines in a store.
///
/// Writes go through the engines; this type only reads.
#[derive(Debug, Clone)]
pub struct MovementLedger<S> {
    store: S,
}

impl<S> MovementLedger<S>
where
    S: StockStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All movements of a stock in ascending id order.
    pub fn history(&self, stock_id: StockId) -> Result<Vec<Movement>, LedgerError> {
        self.store
            .movements(stock_id)
            .map_err(|e| LedgerError::read("history", e))
    }

    /// The movement with the highest id, if any.
    pub fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, LedgerError> {
        self.store
            .last_movement(stock_id)
            .map_err(|e| LedgerError::read("last_movement", e))
    }

    /// Resolve a movement reference against a stock's history.
    ///
    /// A record is only accepted when it belongs to the stock and is actually
    /// stored; the stored copy is returned.
    pub fn movement(&self, stock_id: StockId, reference: impl Into<MovementRef>) -> Result<Movement, LedgerError> {
        let id = match reference.into() {
            MovementRef::Record(record) => {
                if record.stock_id != stock_id {
                    return Err(StockError::invalid_movement(format!(
                        "movement {} belongs to stock {}, not {}",
                        record.id, record.stock_id, stock_id
                    ))
                    .into());
                }
                record.id
            }
            MovementRef::Id(id) => id,
        };

        self.store
            .movement(stock_id, id)
            .map_err(|e| LedgerError::read("movement", e))?
            .ok_or_else(|| {
                StockError::invalid_movement(format!("stock {stock_id} has no movement {id}")).into()
            })
    }

    /// Movements from `target` (inclusive) up to the newest, newest first.
    pub fn movements_from(&self, stock_id: StockId, target: &Movement) -> Result<Vec<Movement>, LedgerError> {
        self.store
            .movements_from(stock_id, target.id)
            .map_err(|e| LedgerError::read("movements_from", e))
    }

    /// Replay the history from zero and return the quantity it arrives at.
    pub fn reconstruct(&self, stock_id: StockId) -> Result<Quantity, LedgerError> {
        Ok(reconstruct(&self.history(stock_id)?)?)
    }

    /// Check that the record's quantity equals its replayed history.
    pub fn verify(&self, stock: &StockRecord) -> Result<(), LedgerError> {
        let replayed = self.reconstruct(stock.id_typed())?;
        if replayed != stock.quantity() {
            warn!(
                stock_id = %stock.id_typed(),
                quantity = %stock.quantity(),
                replayed = %replayed,
                "stock quantity diverges from its movement history"
            );
            return Err(StockError::invalid_movement(format!(
                "stock {} holds {} but its history adds up to {}",
                stock.id_typed(),
                stock.quantity(),
                replayed
            ))
            .into());
        }
        Ok(())
    }
}
