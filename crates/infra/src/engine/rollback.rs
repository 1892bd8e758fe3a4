//! Rollback of stock lines to historical quantities.
//!
//! A rollback is an ordinary quantity change: it commits through the same
//! boundary as `put`/`take` and appends a corrective movement. History is
//! never rewritten.

use tracing::{info, warn};

use stockledger_core::{StockError, StockId};
use stockledger_events::EventBus;
use stockledger_inventory::{Movement, MovementRef, StockEvent, StockRecord, decide_rollback};

use crate::engine::mutation::MutationEngine;
use crate::error::LedgerError;
use crate::locations::LocationResolver;
use crate::store::StockStore;

/// Result of [`RollbackEngine::rollback_with`].
#[derive(Debug)]
pub enum RollbackOutcome {
    Single(StockRecord),
    /// One entry per replayed movement, newest first.
    Recursive(Vec<Result<StockRecord, LedgerError>>),
}

impl RollbackOutcome {
    /// The last successfully committed record, if any.
    pub fn final_stock(&self) -> Option<&StockRecord> {
        match self {
            RollbackOutcome::Single(stock) => Some(stock),
            RollbackOutcome::Recursive(steps) => steps.iter().rev().find_map(|r| r.as_ref().ok()),
        }
    }
}

pub struct RollbackEngine<S, B, L> {
    mutations: MutationEngine<S, B, L>,
}

impl<S, B, L> Clone for RollbackEngine<S, B, L> {
    fn clone(&self) -> Self {
        Self {
            mutations: self.mutations.clone(),
        }
    }
}

impl<S, B, L> RollbackEngine<S, B, L>
where
    S: StockStore,
    B: EventBus<StockEvent>,
    L: LocationResolver,
{
    /// Rollbacks commit through `mutations`, sharing its locks, store, bus
    /// and acting user.
    pub fn new(mutations: MutationEngine<S, B, L>) -> Self {
        Self { mutations }
    }

    pub fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, LedgerError> {
        self.mutations.ledger().last_movement(stock_id)
    }

    pub fn movement(&self, stock_id: StockId, reference: impl Into<MovementRef>) -> Result<Movement, LedgerError> {
        self.mutations.ledger().movement(stock_id, reference)
    }

    /// Restore the quantity recorded before `target` (the last movement when
    /// `None`).
    pub fn rollback(&self, stock_id: StockId, target: Option<MovementRef>) -> Result<StockRecord, LedgerError> {
        let target = self.resolve_target(stock_id, target)?;
        self.rollback_movement(stock_id, &target)
    }

    /// Roll back every movement from the newest down to `target`, inclusive.
    ///
    /// The movements to replay are selected once, before the first step, so
    /// the corrective movements written along the way are not replayed. Each
    /// step commits on its own; a failed step is reported in place and the
    /// remaining steps still run.
    pub fn rollback_recursive(
        &self,
        stock_id: StockId,
        target: Option<MovementRef>,
    ) -> Result<Vec<Result<StockRecord, LedgerError>>, LedgerError> {
        let target = self.resolve_target(stock_id, target)?;
        let replay = self.mutations.ledger().movements_from(stock_id, &target)?;
        info!(
            stock_id = %stock_id,
            target = %target.id,
            steps = replay.len(),
            "recursive rollback started"
        );

        Ok(replay
            .iter()
            .map(|movement| {
                let step = self.rollback_movement(stock_id, movement);
                if let Err(err) = &step {
                    warn!(
                        stock_id = %stock_id,
                        movement_id = %movement.id,
                        error = %err,
                        "rollback step failed; continuing"
                    );
                }
                step
            })
            .collect())
    }

    pub fn rollback_with(
        &self,
        stock_id: StockId,
        target: Option<MovementRef>,
        recursive: bool,
    ) -> Result<RollbackOutcome, LedgerError> {
        if recursive {
            self.rollback_recursive(stock_id, target)
                .map(RollbackOutcome::Recursive)
        } else {
            self.rollback(stock_id, target).map(RollbackOutcome::Single)
        }
    }

    fn resolve_target(&self, stock_id: StockId, target: Option<MovementRef>) -> Result<Movement, LedgerError> {
        match target {
            Some(reference) => self.movement(stock_id, reference),
            None => self
                .last_movement(stock_id)?
                .ok_or_else(|| StockError::NoMovements(stock_id).into()),
        }
    }

    fn rollback_movement(&self, stock_id: StockId, target: &Movement) -> Result<StockRecord, LedgerError> {
        let config = *self.mutations.config();
        self.mutations.apply(stock_id, "rollback", |stock| {
            decide_rollback(stock, target, &config)
        })
    }
}
