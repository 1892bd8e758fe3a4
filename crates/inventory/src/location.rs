use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockledger_core::{LocationId, StockError};

/// A storage location, as exposed by the location registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
}

/// Reference to a location: a resolved record, or an id to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationRef {
    Location(Location),
    Id(LocationId),
}

impl LocationRef {
    pub fn id(&self) -> LocationId {
        match self {
            LocationRef::Location(l) => l.id,
            LocationRef::Id(id) => *id,
        }
    }
}

impl From<Location> for LocationRef {
    fn from(value: Location) -> Self {
        Self::Location(value)
    }
}

impl From<&Location> for LocationRef {
    fn from(value: &Location) -> Self {
        Self::Location(value.clone())
    }
}

impl From<LocationId> for LocationRef {
    fn from(value: LocationId) -> Self {
        Self::Id(value)
    }
}

impl From<u64> for LocationRef {
    fn from(value: u64) -> Self {
        Self::Id(LocationId::new(value))
    }
}

/// Numeric text resolves to an id; anything else is `InvalidLocation`.
impl FromStr for LocationRef {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<LocationId>().map(Self::Id)
    }
}
