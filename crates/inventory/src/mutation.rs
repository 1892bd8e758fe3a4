//! Pure mutation decisions.
//!
//! Each `decide_*` function looks at a stock line and a request and returns
//! either the change to commit or `Decision::Unchanged`. Nothing here touches
//! storage; the infrastructure layer commits the change and appends the
//! movement built from it.

use stockledger_core::{Cost, LedgerConfig, MovementId, Quantity, StockError, StockResult, UserId};

use crate::movement::{CHANGE_REASON, Movement, NewMovement, reason_or_default};
use crate::stock::StockLine;

/// Why a stock's quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Taken,
    Added,
    RolledBack { target: MovementId },
}

/// A quantity change ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub kind: ChangeKind,
    pub before: Quantity,
    pub after: Quantity,
    pub reason: String,
    pub cost: Cost,
}

impl StockChange {
    pub fn to_movement(&self, line: &impl StockLine, created_by: Option<UserId>) -> NewMovement {
        NewMovement {
            stock_id: line.stock_id(),
            before: self.before,
            after: self.after,
            reason: self.reason.clone(),
            cost: self.cost,
            created_by,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to commit; the record is returned as-is.
    Unchanged,
    Change(StockChange),
}

/// Direction of an absolute quantity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    Put(Quantity),
    Take(Quantity),
}

/// `Ok(true)` when `quantity` can be taken from the line.
///
/// Taking exactly the current amount is always allowed.
pub fn has_enough_stock(line: &impl StockLine, quantity: Quantity) -> StockResult<bool> {
    let current = line.current_quantity();
    if current >= quantity {
        return Ok(true);
    }
    Err(StockError::not_enough_stock(quantity, current))
}

pub fn decide_take(
    line: &impl StockLine,
    quantity: Quantity,
    reason: &str,
    cost: Cost,
    config: &LedgerConfig,
) -> StockResult<Decision> {
    has_enough_stock(line, quantity)?;

    let current = line.current_quantity();
    let left = current
        .minus(quantity)
        .ok_or_else(|| StockError::not_enough_stock(quantity, current))?;

    Ok(change_or_unchanged(
        ChangeKind::Taken,
        current,
        left,
        reason_or_default(reason, CHANGE_REASON),
        cost,
        config,
    ))
}

pub fn decide_put(
    line: &impl StockLine,
    quantity: Quantity,
    reason: &str,
    cost: Cost,
    config: &LedgerConfig,
) -> StockResult<Decision> {
    let current = line.current_quantity();
    let total = current.plus(quantity)?;

    Ok(change_or_unchanged(
        ChangeKind::Added,
        current,
        total,
        reason_or_default(reason, CHANGE_REASON),
        cost,
        config,
    ))
}

/// Restore the quantity recorded before `target`.
///
/// The cost is the inverse of the target's cost when cost rollback is
/// enabled, and zero otherwise.
pub fn decide_rollback(
    line: &impl StockLine,
    target: &Movement,
    config: &LedgerConfig,
) -> StockResult<Decision> {
    if target.stock_id != line.stock_id() {
        return Err(StockError::invalid_movement(format!(
            "movement {} belongs to stock {}, not {}",
            target.id,
            target.stock_id,
            line.stock_id()
        )));
    }

    let cost = if config.rollback_cost {
        target.cost.negated()
    } else {
        Cost::ZERO
    };

    Ok(change_or_unchanged(
        ChangeKind::RolledBack { target: target.id },
        line.current_quantity(),
        target.before,
        target.rollback_reason(),
        cost,
        config,
    ))
}

/// Express "set the quantity to `target`" as a put or a take of the
/// difference, so the history stays delta-consistent.
pub fn plan_update(line: &impl StockLine, target: Quantity) -> QuantityUpdate {
    let current = line.current_quantity();
    if target > current {
        // `target > current` so the subtraction cannot underflow.
        QuantityUpdate::Put(target.minus(current).unwrap_or(Quantity::ZERO))
    } else {
        QuantityUpdate::Take(current.minus(target).unwrap_or(Quantity::ZERO))
    }
}

fn change_or_unchanged(
    kind: ChangeKind,
    before: Quantity,
    after: Quantity,
    reason: String,
    cost: Cost,
    config: &LedgerConfig,
) -> Decision {
    if before == after && !config.allow_duplicate_movements {
        return Decision::Unchanged;
    }
    Decision::Change(StockChange {
        kind,
        before,
        after,
        reason,
        cost,
    })
}
