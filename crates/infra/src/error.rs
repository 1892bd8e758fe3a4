//! Engine error model.

use thiserror::Error;

use stockledger_core::StockError;

use crate::store::StoreError;

/// Error returned by the ledger engines.
///
/// Domain failures pass through unchanged. Storage failures keep the store's
/// error as their `source`, so a failed commit is never reduced to a bare
/// boolean.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Stock(#[from] StockError),

    /// The write did not happen; nothing was applied.
    #[error("{operation} failed to commit")]
    Commit {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation} failed to read from the store")]
    Read {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    pub fn commit(operation: &'static str, source: StoreError) -> Self {
        Self::Commit { operation, source }
    }

    pub fn read(operation: &'static str, source: StoreError) -> Self {
        Self::Read { operation, source }
    }

    /// The domain error, if this is one.
    pub fn as_stock(&self) -> Option<&StockError> {
        match self {
            LedgerError::Stock(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_commit_failure(&self) -> bool {
        matches!(self, LedgerError::Commit { .. })
    }
}
