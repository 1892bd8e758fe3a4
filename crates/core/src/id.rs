//! Strongly-typed identifiers used across the ledger.
//!
//! Stock lines, movements, items and locations use numeric ids assigned by
//! storage: movement ids double as the ordering key of a stock's history.
//! Users are identified by UUIDv7.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StockError;

/// Identifier of a stock line (one per item/location pair).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockId(u64);

/// Identifier of a movement. Strictly increasing in commit order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(u64);

/// Identifier of an inventory item (owned by the item registry).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

/// Identifier of a location (owned by the location registry).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(u64);

/// Identifier of a user (movement creator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

macro_rules! impl_numeric_id {
    ($t:ty, $name:literal, $err:path) => {
        impl $t {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = StockError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| $err(format!("{}: '{}' ({})", $name, s, e)))
            }
        }
    };
}

impl_numeric_id!(StockId, "StockId", StockError::InvalidId);
impl_numeric_id!(MovementId, "MovementId", StockError::InvalidMovement);
impl_numeric_id!(ItemId, "ItemId", StockError::InvalidId);
impl_numeric_id!(LocationId, "LocationId", StockError::InvalidLocation);

impl UserId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for UserId {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| StockError::InvalidId(format!("UserId: {e}")))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_parse_from_padded_text() {
        assert_eq!(" 42 ".parse::<StockId>().unwrap(), StockId::new(42));
        assert_eq!("7".parse::<MovementId>().unwrap().get(), 7);
    }

    #[test]
    fn unparseable_ids_map_to_their_reference_kind() {
        assert!(matches!(
            "north".parse::<LocationId>(),
            Err(StockError::InvalidLocation(_))
        ));
        assert!(matches!(
            "-3".parse::<MovementId>(),
            Err(StockError::InvalidMovement(_))
        ));
        assert!(matches!("x".parse::<ItemId>(), Err(StockError::InvalidId(_))));
    }

    #[test]
    fn movement_ids_order_numerically() {
        assert!(MovementId::new(9) < MovementId::new(10));
    }
}
