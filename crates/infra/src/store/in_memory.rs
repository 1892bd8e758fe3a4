use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use stockledger_core::{AggregateRoot, ItemId, LocationId, MovementId, Quantity, StockId};
use stockledger_inventory::{Movement, NewMovement, NewStock, StockRecord};

use super::r#trait::{Committed, MovementMeta, StockStore, StockUpdate, StoreError};

#[derive(Debug, Default)]
struct State {
    stocks: BTreeMap<StockId, StockRecord>,
    by_key: HashMap<(ItemId, LocationId), StockId>,
    /// Per-stock history, ascending by id.
    movements: HashMap<StockId, Vec<Movement>>,
    last_stock_id: u64,
    last_movement_id: u64,
}

impl State {
    fn append(&mut self, movement: NewMovement) -> Movement {
        self.last_movement_id += 1;
        let stored = Movement {
            id: MovementId::new(self.last_movement_id),
            stock_id: movement.stock_id,
            before: movement.before,
            after: movement.after,
            reason: movement.reason,
            cost: movement.cost,
            created_by: movement.created_by,
            created_at: Utc::now(),
        };
        self.movements
            .entry(stored.stock_id)
            .or_default()
            .push(stored.clone());
        stored
    }

    fn history(&self, stock_id: StockId) -> &[Movement] {
        self.movements.get(&stock_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// In-memory stock store.
///
/// Intended for tests/dev and embedded use. Movement and stock ids come from
/// global counters, so ids increase across all stocks exactly as a database
/// sequence would.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: RwLock<State>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

impl StockStore for InMemoryStockStore {
    fn insert_stock(&self, stock: NewStock, first: MovementMeta) -> Result<Committed, StoreError> {
        let mut state = self.write()?;

        let key = (stock.item_id, stock.location_id);
        if state.by_key.contains_key(&key) {
            return Err(StoreError::UniqueViolation(format!(
                "stock for item {} at location {} already exists",
                stock.item_id, stock.location_id
            )));
        }

        state.last_stock_id += 1;
        let id = StockId::new(state.last_stock_id);
        let record = StockRecord::from_parts(
            id,
            stock.item_id,
            stock.location_id,
            stock.quantity,
            stock.placement,
            1,
        );

        let movement = state.append(NewMovement {
            stock_id: id,
            before: Quantity::ZERO,
            after: stock.quantity,
            reason: first.reason,
            cost: first.cost,
            created_by: first.created_by,
        });
        state.by_key.insert(key, id);
        state.stocks.insert(id, record.clone());

        Ok(Committed {
            stock: record,
            movement: Some(movement),
        })
    }

    fn load_stock(&self, stock_id: StockId) -> Result<Option<StockRecord>, StoreError> {
        Ok(self.read()?.stocks.get(&stock_id).cloned())
    }

    fn find_stock(&self, item_id: ItemId, location_id: LocationId) -> Result<Option<StockRecord>, StoreError> {
        let state = self.read()?;
        Ok(state
            .by_key
            .get(&(item_id, location_id))
            .and_then(|id| state.stocks.get(id))
            .cloned())
    }

    fn stocks_for_item(&self, item_id: ItemId) -> Result<Vec<StockRecord>, StoreError> {
        Ok(self
            .read()?
            .stocks
            .values()
            .filter(|s| s.item_id() == item_id)
            .cloned()
            .collect())
    }

    fn commit(&self, update: StockUpdate) -> Result<Committed, StoreError> {
        let mut state = self.write()?;

        let current = state
            .stocks
            .get(&update.stock_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("stock {}", update.stock_id)))?;

        if !update.expected_version.matches(current.version()) {
            return Err(StoreError::Concurrency(format!(
                "expected {:?}, found {}",
                update.expected_version,
                current.version()
            )));
        }

        if let Some(movement) = &update.movement {
            if movement.stock_id != update.stock_id {
                return Err(StoreError::InvalidWrite(format!(
                    "movement targets stock {}, update targets {}",
                    movement.stock_id, update.stock_id
                )));
            }
            if movement.before != current.quantity() || movement.after != update.quantity {
                return Err(StoreError::InvalidWrite(format!(
                    "movement {} -> {} does not match stored {} -> {}",
                    movement.before,
                    movement.after,
                    current.quantity(),
                    update.quantity
                )));
            }
        }

        let relocating = update.location_id != current.location_id();
        if relocating {
            let key = (current.item_id(), update.location_id);
            if state.by_key.contains_key(&key) {
                return Err(StoreError::UniqueViolation(format!(
                    "stock for item {} at location {} already exists",
                    current.item_id(),
                    update.location_id
                )));
            }
        }

        // All checks passed; from here on nothing can fail.
        let record = StockRecord::from_parts(
            current.id_typed(),
            current.item_id(),
            update.location_id,
            update.quantity,
            current.placement().clone(),
            current.version() + 1,
        );
        if relocating {
            state.by_key.remove(&(current.item_id(), current.location_id()));
            state
                .by_key
                .insert((current.item_id(), update.location_id), current.id_typed());
        }
        state.stocks.insert(record.id_typed(), record.clone());
        let movement = update.movement.map(|m| state.append(m));

        Ok(Committed {
            stock: record,
            movement,
        })
    }

    fn movements(&self, stock_id: StockId) -> Result<Vec<Movement>, StoreError> {
        Ok(self.read()?.history(stock_id).to_vec())
    }

    fn movement(&self, stock_id: StockId, movement_id: MovementId) -> Result<Option<Movement>, StoreError> {
        let state = self.read()?;
        let history = state.history(stock_id);
        Ok(history
            .binary_search_by_key(&movement_id, |m| m.id)
            .ok()
            .map(|idx| history[idx].clone()))
    }

    fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, StoreError> {
        Ok(self.read()?.history(stock_id).last().cloned())
    }

    fn movements_from(&self, stock_id: StockId, from: MovementId) -> Result<Vec<Movement>, StoreError> {
        Ok(self
            .read()?
            .history(stock_id)
            .iter()
            .rev()
            .take_while(|m| m.id >= from)
            .cloned()
            .collect())
    }

    fn delete_stock(&self, stock_id: StockId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let record = state
            .stocks
            .remove(&stock_id)
            .ok_or_else(|| StoreError::NotFound(format!("stock {stock_id}")))?;
        state.by_key.remove(&(record.item_id(), record.location_id()));
        state.movements.remove(&stock_id);
        Ok(())
    }
}
