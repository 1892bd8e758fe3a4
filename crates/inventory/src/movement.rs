use core::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{Cost, MovementId, Quantity, StockError, StockId, StockResult, UserId};

/// Reason recorded on the first movement of a stock line when none is given.
pub const FIRST_RECORD_REASON: &str = "First Item Record; Stock Increase";

/// Reason recorded on later movements when none is given.
pub const CHANGE_REASON: &str = "Stock Adjustment";

/// `reason`, or `default` when the caller left it blank.
pub fn reason_or_default(reason: &str, default: &str) -> String {
    if reason.trim().is_empty() {
        default.to_string()
    } else {
        reason.to_string()
    }
}

/// Immutable audit entry for one committed quantity change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub stock_id: StockId,
    pub before: Quantity,
    pub after: Quantity,
    pub reason: String,
    pub cost: Cost,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// `after - before`.
    pub fn delta(&self) -> Decimal {
        self.after.delta_from(self.before)
    }

    /// Reason text for a rollback of this movement.
    pub fn rollback_reason(&self) -> String {
        format!(
            "Rolled back to movement {} recorded at {}",
            self.id,
            self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// A movement waiting to be appended; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub stock_id: StockId,
    pub before: Quantity,
    pub after: Quantity,
    pub reason: String,
    pub cost: Cost,
    pub created_by: Option<UserId>,
}

/// Reference to a movement: either the record itself or its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementRef {
    Record(Movement),
    Id(MovementId),
}

impl From<Movement> for MovementRef {
    fn from(value: Movement) -> Self {
        Self::Record(value)
    }
}

impl From<&Movement> for MovementRef {
    fn from(value: &Movement) -> Self {
        Self::Record(value.clone())
    }
}

impl From<MovementId> for MovementRef {
    fn from(value: MovementId) -> Self {
        Self::Id(value)
    }
}

impl From<u64> for MovementRef {
    fn from(value: u64) -> Self {
        Self::Id(MovementId::new(value))
    }
}

/// Numeric text resolves to an id; anything else is `InvalidMovement`.
impl FromStr for MovementRef {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<MovementId>().map(Self::Id)
    }
}

/// Replays a stock's history (ascending id order) from zero and returns the
/// quantity it arrives at.
///
/// Fails when the first movement does not start at zero or when a movement's
/// `before` does not continue from the previous `after`.
pub fn reconstruct(movements: &[Movement]) -> StockResult<Quantity> {
    let mut running = Decimal::ZERO;
    let mut previous: Option<&Movement> = None;

    for m in movements {
        if let Some(prev) = previous {
            if m.id <= prev.id {
                return Err(StockError::invalid_movement(format!(
                    "history out of order: {} follows {}",
                    m.id, prev.id
                )));
            }
        }
        if m.before.value() != running {
            return Err(StockError::invalid_movement(format!(
                "movement {} starts at {} but the ledger stood at {}",
                m.id,
                m.before,
                running.normalize()
            )));
        }
        running += m.delta();
        previous = Some(m);
    }

    Quantity::from_decimal(running)
}
