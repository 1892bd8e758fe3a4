//! Commit pipeline for stock mutations.
//!
//! ```text
//! request
//!   -> parse quantity / cost / location        (no lock, no IO)
//!   -> lock stock
//!   -> load current record
//!   -> decide (pure, stockledger-inventory)
//!   -> StockStore::commit (record + movement, version-checked)
//!   -> publish notification                    (only after commit)
//!   -> unlock
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use stockledger_core::{
    AggregateRoot, Cost, ExpectedVersion, ItemId, LedgerConfig, NumericInput, Quantity, StockError,
    StockId, StockResult, UserId,
};
use stockledger_events::{Event, EventBus};
use stockledger_inventory::{
    Decision, FIRST_RECORD_REASON, Location, LocationRef, NewStock, Placement, QuantityUpdate,
    StockCreated, StockEvent, StockMoved, StockRecord, Transaction, decide_put, decide_take,
    has_enough_stock, plan_update, reason_or_default,
};

use crate::error::LedgerError;
use crate::ledger::MovementLedger;
use crate::locations::LocationResolver;
use crate::locks::StockLocks;
use crate::store::{MovementMeta, StockStore, StockUpdate, StoreError};

struct Shared<S, B, L> {
    store: Arc<S>,
    bus: B,
    locations: L,
    config: LedgerConfig,
    locks: StockLocks,
}

/// Validates and applies quantity changes and relocations.
///
/// Cheap to clone; clones share the store, bus and lock table. Each handle
/// carries its own acting user (see [`MutationEngine::with_actor`]).
pub struct MutationEngine<S, B, L> {
    shared: Arc<Shared<S, B, L>>,
    actor: Option<UserId>,
}

impl<S, B, L> Clone for MutationEngine<S, B, L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            actor: self.actor,
        }
    }
}

impl<S, B, L> MutationEngine<S, B, L> {
    pub fn new(store: S, bus: B, locations: L, config: LedgerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: Arc::new(store),
                bus,
                locations,
                config,
                locks: StockLocks::new(),
            }),
            actor: None,
        }
    }

    /// A handle that attributes every movement it writes to `user`.
    pub fn with_actor(&self, user: UserId) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            actor: Some(user),
        }
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }
}

impl<S, B, L> MutationEngine<S, B, L>
where
    S: StockStore,
    B: EventBus<StockEvent>,
    L: LocationResolver,
{
    pub fn ledger(&self) -> MovementLedger<Arc<S>> {
        MovementLedger::new(Arc::clone(&self.shared.store))
    }

    pub fn resolve_location(&self, reference: &LocationRef) -> StockResult<Location> {
        self.shared.locations.resolve(reference)
    }

    /// Load a stock line; a missing one is `StockNotFound`.
    pub fn stock(&self, stock_id: StockId) -> Result<StockRecord, LedgerError> {
        self.shared
            .store
            .load_stock(stock_id)
            .map_err(|e| LedgerError::read("load_stock", e))?
            .ok_or_else(|| StockError::stock_not_found(format!("stock {stock_id}")).into())
    }

    /// Create the stock line for `item_id` at `location` together with its
    /// first movement (0 -> `quantity`).
    pub fn open_stock(
        &self,
        item_id: ItemId,
        location: impl Into<LocationRef>,
        quantity: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
        placement: Placement,
    ) -> Result<StockRecord, LedgerError> {
        let quantity = Quantity::parse(quantity)?;
        let cost = Cost::parse(cost)?;
        let location = self.resolve_location(&location.into())?;
        self.ensure_actor()?;

        let stock = NewStock {
            item_id,
            location_id: location.id,
            quantity,
            placement,
        };
        let first = MovementMeta {
            reason: reason_or_default(reason, FIRST_RECORD_REASON),
            cost,
            created_by: self.actor,
        };

        let committed = self
            .shared
            .store
            .insert_stock(stock, first)
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => StockError::StockAlreadyExists {
                    item: item_id,
                    location: location.id,
                }
                .into(),
                other => LedgerError::commit("open_stock", other),
            })?;

        let stock = committed.stock;
        match committed.movement {
            Some(movement) => {
                info!(
                    stock_id = %stock.id_typed(),
                    item_id = %item_id,
                    location_id = %location.id,
                    quantity = %stock.quantity(),
                    movement_id = %movement.id,
                    "stock opened"
                );
                self.publish(StockEvent::Created(StockCreated {
                    stock: stock.clone(),
                    movement_id: movement.id,
                    occurred_at: movement.created_at,
                }));
            }
            None => warn!(
                stock_id = %stock.id_typed(),
                "store created the stock without returning its first movement; notification skipped"
            ),
        }
        Ok(stock)
    }

    /// Remove a stock line and its history.
    pub fn delete_stock(&self, stock_id: StockId) -> Result<(), LedgerError> {
        self.shared.locks.with_lock(stock_id, || -> Result<(), LedgerError> {
            self.shared.store.delete_stock(stock_id).map_err(|e| match e {
                StoreError::NotFound(_) => {
                    StockError::stock_not_found(format!("stock {stock_id}")).into()
                }
                other => LedgerError::commit("delete_stock", other),
            })
        })?;
        self.shared.locks.forget(stock_id);
        info!(stock_id = %stock_id, "stock deleted");
        Ok(())
    }

    /// Take `quantity` out of the stock line.
    pub fn take(
        &self,
        stock_id: StockId,
        quantity: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        let quantity = Quantity::parse(quantity)?;
        let cost = Cost::parse(cost)?;
        let config = self.shared.config;
        self.apply(stock_id, "take", |stock| {
            decide_take(stock, quantity, reason, cost, &config)
        })
    }

    /// Alias of [`MutationEngine::take`].
    pub fn remove(
        &self,
        stock_id: StockId,
        quantity: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        self.take(stock_id, quantity, reason, cost)
    }

    /// Put `quantity` into the stock line.
    pub fn put(
        &self,
        stock_id: StockId,
        quantity: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        let quantity = Quantity::parse(quantity)?;
        let cost = Cost::parse(cost)?;
        let config = self.shared.config;
        self.apply(stock_id, "put", |stock| {
            decide_put(stock, quantity, reason, cost, &config)
        })
    }

    /// Alias of [`MutationEngine::put`].
    pub fn add(
        &self,
        stock_id: StockId,
        quantity: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        self.put(stock_id, quantity, reason, cost)
    }

    /// Set the quantity to `target` by putting or taking the difference.
    ///
    /// The direction is chosen under the stock lock, against the quantity
    /// actually stored.
    pub fn update_quantity(
        &self,
        stock_id: StockId,
        target: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        let target = Quantity::parse(target)?;
        let cost = Cost::parse(cost)?;
        let config = self.shared.config;
        self.apply(stock_id, "update_quantity", |stock| {
            match plan_update(stock, target) {
                QuantityUpdate::Put(q) => decide_put(stock, q, reason, cost, &config),
                QuantityUpdate::Take(q) => decide_take(stock, q, reason, cost, &config),
            }
        })
    }

    /// Relocate the stock line. Writes no movement.
    pub fn move_to(
        &self,
        stock_id: StockId,
        location: impl Into<LocationRef>,
    ) -> Result<StockRecord, LedgerError> {
        let target = self.resolve_location(&location.into())?;
        self.ensure_actor()?;

        self.shared.locks.with_lock(stock_id, || -> Result<StockRecord, LedgerError> {
            let stock = self.stock(stock_id)?;
            let from = stock.location_id();
            if from == target.id {
                debug!(stock_id = %stock_id, location_id = %from, "stock already at location");
                return Ok(stock);
            }

            let update = StockUpdate {
                stock_id,
                expected_version: ExpectedVersion::Exact(stock.version()),
                quantity: stock.quantity(),
                location_id: target.id,
                movement: None,
            };
            let committed = self.shared.store.commit(update).map_err(|e| match e {
                StoreError::UniqueViolation(_) => StockError::StockAlreadyExists {
                    item: stock.item_id(),
                    location: target.id,
                }
                .into(),
                other => LedgerError::commit("move_to", other),
            })?;

            info!(stock_id = %stock_id, from = %from, to = %target.id, "stock moved");
            self.publish(StockEvent::Moved(StockMoved {
                stock: committed.stock.clone(),
                from,
                to: target.id,
                occurred_at: Utc::now(),
            }));
            Ok(committed.stock)
        })
    }

    /// `Ok(true)` when `quantity` can be taken; `NotEnoughStock` otherwise.
    pub fn has_enough_stock(
        &self,
        stock_id: StockId,
        quantity: impl NumericInput,
    ) -> Result<bool, LedgerError> {
        let quantity = Quantity::parse(quantity)?;
        let stock = self.stock(stock_id)?;
        Ok(has_enough_stock(&stock, quantity)?)
    }

    /// An unsaved transaction bound to the stock, attributed to this handle's actor.
    pub fn new_transaction(
        &self,
        stock_id: StockId,
        name: impl Into<String>,
    ) -> Result<Transaction, LedgerError> {
        let transaction = self.stock(stock_id)?.new_transaction(name);
        Ok(match self.actor {
            Some(user) => transaction.created_by(user),
            None => transaction,
        })
    }

    /// Shared commit boundary of every quantity change.
    pub(crate) fn apply(
        &self,
        stock_id: StockId,
        operation: &'static str,
        decide: impl FnOnce(&StockRecord) -> StockResult<Decision>,
    ) -> Result<StockRecord, LedgerError> {
        self.ensure_actor()?;

        self.shared.locks.with_lock(stock_id, || -> Result<StockRecord, LedgerError> {
            let stock = self.stock(stock_id)?;
            let change = match decide(&stock)? {
                Decision::Unchanged => {
                    debug!(
                        stock_id = %stock_id,
                        operation,
                        quantity = %stock.quantity(),
                        "quantity unchanged; nothing recorded"
                    );
                    return Ok(stock);
                }
                Decision::Change(change) => change,
            };

            let update = StockUpdate {
                stock_id,
                expected_version: ExpectedVersion::Exact(stock.version()),
                quantity: change.after,
                location_id: stock.location_id(),
                movement: Some(change.to_movement(&stock, self.actor)),
            };
            let committed = self
                .shared
                .store
                .commit(update)
                .map_err(|e| LedgerError::commit(operation, e))?;

            match &committed.movement {
                Some(movement) => {
                    info!(
                        stock_id = %stock_id,
                        operation,
                        movement_id = %movement.id,
                        before = %movement.before,
                        after = %movement.after,
                        "stock change committed"
                    );
                    self.publish(StockEvent::for_change(
                        change.kind,
                        committed.stock.clone(),
                        movement,
                    ));
                }
                None => warn!(
                    stock_id = %stock_id,
                    operation,
                    "store committed without returning the movement; notification skipped"
                ),
            }
            Ok(committed.stock)
        })
    }

    fn ensure_actor(&self) -> StockResult<()> {
        if self.actor.is_none() && !self.shared.config.allow_no_user {
            return Err(StockError::MissingActor);
        }
        Ok(())
    }

    /// Fire-and-forget: the change is already durable.
    fn publish(&self, event: StockEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.shared.bus.publish(event) {
            warn!(event_type, error = ?err, "failed to publish stock notification");
        }
    }
}
