//! Write side of the ledger: quantity changes, relocations and rollbacks.

pub mod mutation;
pub mod rollback;

pub use mutation::MutationEngine;
pub use rollback::{RollbackEngine, RollbackOutcome};
