//! Location lookup.
//!
//! The ledger does not own locations; it only needs to turn a `LocationRef`
//! into a `Location` or fail with `InvalidLocation`.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use stockledger_core::{LocationId, StockError, StockResult};
use stockledger_inventory::{Location, LocationRef};

pub trait LocationResolver: Send + Sync {
    fn resolve(&self, reference: &LocationRef) -> StockResult<Location>;
}

impl<R> LocationResolver for Arc<R>
where
    R: LocationResolver + ?Sized,
{
    fn resolve(&self, reference: &LocationRef) -> StockResult<Location> {
        (**self).resolve(reference)
    }
}

/// In-memory location registry.
#[derive(Debug, Default)]
pub struct LocationRegistry {
    locations: RwLock<BTreeMap<LocationId, Location>>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new location under the next free id.
    pub fn register(&self, name: impl Into<String>) -> Location {
        let mut locations = self.locations.write().unwrap_or_else(|p| p.into_inner());
        let next = locations.keys().next_back().map(|id| id.get() + 1).unwrap_or(1);
        let location = Location {
            id: LocationId::new(next),
            name: name.into(),
        };
        locations.insert(location.id, location.clone());
        location
    }

    /// Insert or replace a location with a caller-chosen id.
    pub fn insert(&self, location: Location) {
        self.locations
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(location.id, location);
    }

    pub fn get(&self, id: LocationId) -> Option<Location> {
        self.locations
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&id)
            .cloned()
    }
}

impl LocationResolver for LocationRegistry {
    fn resolve(&self, reference: &LocationRef) -> StockResult<Location> {
        match reference {
            LocationRef::Location(location) => Ok(location.clone()),
            LocationRef::Id(id) => self
                .get(*id)
                .ok_or_else(|| StockError::invalid_location(format!("no location with id {id}"))),
        }
    }
}
