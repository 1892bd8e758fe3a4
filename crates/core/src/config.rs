//! Ledger configuration.
//!
//! Behaviour switches are passed explicitly into the engines rather than read
//! from process-wide state. `from_env` is a convenience for binaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_ALLOW_DUPLICATE_MOVEMENTS: &str = "STOCKLEDGER_ALLOW_DUPLICATE_MOVEMENTS";
pub const ENV_ROLLBACK_COST: &str = "STOCKLEDGER_ROLLBACK_COST";
pub const ENV_ALLOW_NO_USER: &str = "STOCKLEDGER_ALLOW_NO_USER";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: expected a boolean, got '{value}'")]
    InvalidBool { key: &'static str, value: String },
}

/// Switches that shape how mutations and rollbacks are recorded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Record a movement even when a mutation leaves the quantity unchanged.
    pub allow_duplicate_movements: bool,
    /// Rollbacks carry the inverted cost of the movement they reverse.
    pub rollback_cost: bool,
    /// Permit movements without an acting user.
    pub allow_no_user: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            allow_duplicate_movements: false,
            rollback_cost: true,
            allow_no_user: true,
        }
    }
}

impl LedgerConfig {
    /// Read overrides from `STOCKLEDGER_*` environment variables; unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = read_bool(&lookup, ENV_ALLOW_DUPLICATE_MOVEMENTS)? {
            config.allow_duplicate_movements = v;
        }
        if let Some(v) = read_bool(&lookup, ENV_ROLLBACK_COST)? {
            config.rollback_cost = v;
        }
        if let Some(v) = read_bool(&lookup, ENV_ALLOW_NO_USER)? {
            config.allow_no_user = v;
        }
        tracing::debug!(?config, "ledger configuration loaded");
        Ok(config)
    }

    pub fn with_duplicate_movements(mut self, allow: bool) -> Self {
        self.allow_duplicate_movements = allow;
        self
    }

    pub fn with_rollback_cost(mut self, enabled: bool) -> Self {
        self.rollback_cost = enabled;
        self
    }

    pub fn with_allow_no_user(mut self, allow: bool) -> Self {
        self.allow_no_user = allow;
        self
    }
}

fn read_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { key, value: raw }),
    }
}
