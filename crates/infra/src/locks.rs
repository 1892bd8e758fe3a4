//! Per-stock in-process locks.
//!
//! Every read-modify-write on a stock line holds that line's lock from load to
//! commit, so two writers on the same stock never interleave inside one
//! process. Different stocks never contend. The store's version check still
//! catches writers in other processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use stockledger_core::StockId;

#[derive(Debug, Default)]
pub struct StockLocks {
    locks: Mutex<HashMap<StockId, Arc<Mutex<()>>>>,
}

impl StockLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `stock_id`.
    ///
    /// The guarded value is `()`, so a panic in another holder leaves nothing
    /// inconsistent behind; poisoned locks are recovered.
    pub fn with_lock<T>(&self, stock_id: StockId, f: impl FnOnce() -> T) -> T {
        let handle = self.handle(stock_id);
        let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Drop the lock entry of a deleted stock.
    pub fn forget(&self, stock_id: StockId) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&stock_id);
    }

    fn handle(&self, stock_id: StockId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(stock_id).or_default().clone()
    }
}
