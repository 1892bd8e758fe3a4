use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{LocationId, MovementId, Quantity};
use stockledger_events::Event;

use crate::movement::Movement;
use crate::mutation::ChangeKind;
use crate::stock::StockRecord;

/// Event: StockCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCreated {
    pub stock: StockRecord,
    pub movement_id: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Event payload shared by takes and puts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChanged {
    pub stock: StockRecord,
    pub movement_id: MovementId,
    pub before: Quantity,
    pub after: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved. Relocation writes no movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub stock: StockRecord,
    pub from: LocationId,
    pub to: LocationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockRolledBack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRolledBack {
    pub stock: StockRecord,
    /// The corrective movement written by the rollback.
    pub movement_id: MovementId,
    /// The movement whose `before` was restored.
    pub rolled_back: MovementId,
    pub occurred_at: DateTime<Utc>,
}

/// Notifications published after a stock change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    Created(StockCreated),
    Taken(StockChanged),
    Added(StockChanged),
    Moved(StockMoved),
    RolledBack(StockRolledBack),
}

impl StockEvent {
    /// Build the notification for a committed quantity change.
    pub fn for_change(kind: ChangeKind, stock: StockRecord, movement: &Movement) -> Self {
        match kind {
            ChangeKind::Taken => StockEvent::Taken(StockChanged {
                stock,
                movement_id: movement.id,
                before: movement.before,
                after: movement.after,
                occurred_at: movement.created_at,
            }),
            ChangeKind::Added => StockEvent::Added(StockChanged {
                stock,
                movement_id: movement.id,
                before: movement.before,
                after: movement.after,
                occurred_at: movement.created_at,
            }),
            ChangeKind::RolledBack { target } => StockEvent::RolledBack(StockRolledBack {
                stock,
                movement_id: movement.id,
                rolled_back: target,
                occurred_at: movement.created_at,
            }),
        }
    }

    pub fn stock(&self) -> &StockRecord {
        match self {
            StockEvent::Created(e) => &e.stock,
            StockEvent::Taken(e) | StockEvent::Added(e) => &e.stock,
            StockEvent::Moved(e) => &e.stock,
            StockEvent::RolledBack(e) => &e.stock,
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::Created(_) => "stock.created",
            StockEvent::Taken(_) => "stock.taken",
            StockEvent::Added(_) => "stock.added",
            StockEvent::Moved(_) => "stock.moved",
            StockEvent::RolledBack(_) => "stock.rollback",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::Created(e) => e.occurred_at,
            StockEvent::Taken(e) | StockEvent::Added(e) => e.occurred_at,
            StockEvent::Moved(e) => e.occurred_at,
            StockEvent::RolledBack(e) => e.occurred_at,
        }
    }
}
