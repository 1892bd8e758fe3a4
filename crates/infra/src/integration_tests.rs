//! Integration tests for the full ledger pipeline.
//!
//! Tests: MutationEngine / RollbackEngine -> StockStore -> EventBus
//!
//! Verifies:
//! - Movements and quantities stay consistent through puts, takes and rollbacks
//! - Notifications are published only after a successful commit
//! - Commit failures leave no trace and keep their cause
//! - Concurrent writers on one stock are serialized

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, mpsc};
    use std::thread;

    use proptest::prelude::*;

    use stockledger_core::{
        ItemId, LedgerConfig, LocationId, MovementId, Quantity, StockError, StockId,
    };
    use stockledger_events::{Event, EventBus, InMemoryEventBus, Subscription};
    use stockledger_inventory::{
        Movement, MovementRef, NewStock, Placement, StockEvent, StockRecord,
    };

    use crate::engine::{MutationEngine, RollbackEngine};
    use crate::error::LedgerError;
    use crate::locations::LocationRegistry;
    use crate::store::{Committed, InMemoryStockStore, MovementMeta, StockStore, StockUpdate, StoreError};

    type Bus = Arc<InMemoryEventBus<StockEvent>>;

    struct Harness<S: StockStore> {
        engine: MutationEngine<S, Bus, Arc<LocationRegistry>>,
        rollbacks: RollbackEngine<S, Bus, Arc<LocationRegistry>>,
        events: Subscription<StockEvent>,
        warehouse: LocationId,
    }

    fn harness_with<S: StockStore>(store: S, config: LedgerConfig) -> Harness<S> {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        let registry = Arc::new(LocationRegistry::new());
        let warehouse = registry.register("Warehouse").id;
        registry.register("Shop");
        let engine = MutationEngine::new(store, bus, registry, config);
        let rollbacks = RollbackEngine::new(engine.clone());
        Harness {
            engine,
            rollbacks,
            events,
            warehouse,
        }
    }

    fn harness(config: LedgerConfig) -> Harness<InMemoryStockStore> {
        harness_with(InMemoryStockStore::new(), config)
    }

    fn q(v: i64) -> Quantity {
        Quantity::parse(v).unwrap()
    }

    fn pairs(history: &[Movement]) -> Vec<(Quantity, Quantity)> {
        history.iter().map(|m| (m.before, m.after)).collect()
    }

    fn open<S: StockStore>(h: &Harness<S>, quantity: i64) -> StockId {
        h.engine
            .open_stock(ItemId::new(1), h.warehouse, quantity, "", 0, Placement::default())
            .unwrap()
            .id_typed()
    }

    /// History 0->20, 20->15, 15->25, 25->18.
    fn seeded(h: &Harness<InMemoryStockStore>) -> StockId {
        let id = open(h, 20);
        h.engine.take(id, 5, "sold", 0).unwrap();
        h.engine.put(id, 10, "restock", 0).unwrap();
        h.engine.take(id, 7, "sold", 0).unwrap();
        id
    }

    #[test]
    fn create_take_put_records_each_step() {
        let h = harness(LedgerConfig::default());
        let id = open(&h, 20);

        assert_eq!(h.engine.take(id, 5, "sold", 0).unwrap().quantity(), q(15));
        assert_eq!(h.engine.put(id, 10, "restock", 0).unwrap().quantity(), q(25));

        let history = h.engine.ledger().history(id).unwrap();
        assert_eq!(
            pairs(&history),
            vec![(q(0), q(20)), (q(20), q(15)), (q(15), q(25))]
        );
        assert_eq!(history[1].reason, "sold");
        assert_eq!(history[2].reason, "restock");
    }

    #[test]
    fn overdrawn_take_changes_nothing() {
        let h = harness(LedgerConfig::default());
        let id = open(&h, 10);
        h.events.drain();

        let err = h.engine.take(id, 15, "sold", 0).unwrap_err();
        assert_eq!(
            err.as_stock(),
            Some(&StockError::NotEnoughStock {
                requested: q(15),
                available: q(10)
            })
        );
        assert_eq!(h.engine.stock(id).unwrap().quantity(), q(10));
        assert_eq!(h.engine.ledger().history(id).unwrap().len(), 1);
        assert!(h.events.drain().is_empty());
    }

    #[test]
    fn single_rollback_appends_one_corrective_movement() {
        let h = harness(LedgerConfig::default());
        let id = seeded(&h);

        let target = h.rollbacks.movement(id, MovementId::new(3)).unwrap();
        assert_eq!((target.before, target.after), (q(15), q(25)));

        let stock = h.rollbacks.rollback(id, Some(target.into())).unwrap();
        assert_eq!(stock.quantity(), q(15));

        let history = h.engine.ledger().history(id).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(pairs(&history[4..]), vec![(q(18), q(15))]);
    }

    #[test]
    fn recursive_rollback_to_the_first_movement_empties_the_stock() {
        let h = harness(LedgerConfig::default());
        let id = seeded(&h);
        let first: MovementRef = "1".parse().unwrap();

        let steps = h.rollbacks.rollback_recursive(id, Some(first)).unwrap();
        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(Result::is_ok));
        assert_eq!(h.engine.stock(id).unwrap().quantity(), q(0));

        let history = h.engine.ledger().history(id).unwrap();
        assert_eq!(
            pairs(&history[4..]),
            vec![(q(18), q(25)), (q(25), q(15)), (q(15), q(20)), (q(20), q(0))]
        );
        assert_eq!(h.engine.ledger().reconstruct(id).unwrap(), q(0));
    }

    #[test]
    fn recursive_rollback_only_replays_the_stocks_own_movements() {
        let h = harness(LedgerConfig::default());
        let id = seeded(&h);
        let other = h
            .engine
            .open_stock(ItemId::new(9), h.warehouse, 1, "", 0, Placement::default())
            .unwrap();

        let steps = h
            .rollbacks
            .rollback_recursive(id, Some(MovementId::new(2).into()))
            .unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(h.engine.stock(id).unwrap().quantity(), q(20));
        assert_eq!(h.engine.stock(other.id_typed()).unwrap().quantity(), q(1));
    }

    #[test]
    fn zero_changes_are_suppressed_unless_duplicates_are_allowed() {
        let h = harness(LedgerConfig::default());
        let id = open(&h, 10);
        h.events.drain();

        h.engine.take(id, 0, "", 0).unwrap();
        h.engine.put(id, "0.000", "", 0).unwrap();
        assert_eq!(h.engine.ledger().history(id).unwrap().len(), 1);
        assert!(h.events.drain().is_empty());

        let h = harness(LedgerConfig::default().with_duplicate_movements(true));
        let id = open(&h, 10);
        h.engine.put(id, 0, "recount", 0).unwrap();
        let history = h.engine.ledger().history(id).unwrap();
        assert_eq!(pairs(&history), vec![(q(0), q(10)), (q(10), q(10))]);
    }

    #[test]
    fn notifications_follow_commits_in_order() {
        let h = harness(LedgerConfig::default());
        let id = open(&h, 20);
        h.engine.take(id, 5, "sold", 0).unwrap();
        h.engine.put(id, 1, "found", 0).unwrap();
        h.engine.move_to(id, 2u64).unwrap();
        h.rollbacks.rollback(id, None).unwrap();

        let events = h.events.drain();
        let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec!["stock.created", "stock.taken", "stock.added", "stock.moved", "stock.rollback"]
        );

        let quantities: Vec<_> = events.iter().map(|e| e.stock().quantity()).collect();
        assert_eq!(quantities, vec![q(20), q(15), q(16), q(16), q(15)]);
        assert_eq!(events[3].stock().location_id().get(), 2);
        assert!(events.windows(2).all(|w| w[0].occurred_at() <= w[1].occurred_at()));
    }

    #[test]
    fn text_quantities_behave_like_numbers() {
        let h = harness(LedgerConfig::default());
        let id = open(&h, 20);

        assert_eq!(h.engine.take(id, "5", "", 0).unwrap().quantity(), q(15));
        assert_eq!(h.engine.take(id, "5.0", "", 0).unwrap().quantity(), q(10));
        assert_eq!(h.engine.put(id, 2.5f64, "", "1.25").unwrap().quantity(), Quantity::parse("12.5").unwrap());

        for bad in ["abc", "-1", ""] {
            let err = h.engine.take(id, bad, "", 0).unwrap_err();
            assert!(matches!(err.as_stock(), Some(StockError::InvalidQuantity(_))), "{bad}");
        }
        assert!(matches!(
            h.engine.put(id, -1, "", 0).unwrap_err().as_stock(),
            Some(StockError::InvalidQuantity(_))
        ));
        assert!(matches!(
            h.engine.put(id, 1, "", "lots").unwrap_err().as_stock(),
            Some(StockError::InvalidQuantity(_))
        ));
        assert_eq!(h.engine.ledger().history(id).unwrap().len(), 4);
    }

    /// Store whose commits can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStockStore,
        fail_commits: AtomicBool,
    }

    impl StockStore for FlakyStore {
        fn insert_stock(&self, stock: NewStock, first: MovementMeta) -> Result<Committed, StoreError> {
            self.inner.insert_stock(stock, first)
        }

        fn load_stock(&self, stock_id: StockId) -> Result<Option<StockRecord>, StoreError> {
            self.inner.load_stock(stock_id)
        }

        fn find_stock(&self, item_id: ItemId, location_id: LocationId) -> Result<Option<StockRecord>, StoreError> {
            self.inner.find_stock(item_id, location_id)
        }

        fn stocks_for_item(&self, item_id: ItemId) -> Result<Vec<StockRecord>, StoreError> {
            self.inner.stocks_for_item(item_id)
        }

        fn commit(&self, update: StockUpdate) -> Result<Committed, StoreError> {
            if self.fail_commits.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.commit(update)
        }

        fn movements(&self, stock_id: StockId) -> Result<Vec<Movement>, StoreError> {
            self.inner.movements(stock_id)
        }

        fn movement(&self, stock_id: StockId, movement_id: MovementId) -> Result<Option<Movement>, StoreError> {
            self.inner.movement(stock_id, movement_id)
        }

        fn last_movement(&self, stock_id: StockId) -> Result<Option<Movement>, StoreError> {
            self.inner.last_movement(stock_id)
        }

        fn movements_from(&self, stock_id: StockId, from: MovementId) -> Result<Vec<Movement>, StoreError> {
            self.inner.movements_from(stock_id, from)
        }

        fn delete_stock(&self, stock_id: StockId) -> Result<(), StoreError> {
            self.inner.delete_stock(stock_id)
        }
    }

    #[test]
    fn commit_failure_leaves_no_trace_and_keeps_its_cause() {
        let store = Arc::new(FlakyStore::default());
        let h = harness_with(store.clone(), LedgerConfig::default());
        let id = open(&h, 20);
        h.events.drain();

        store.fail_commits.store(true, Ordering::SeqCst);
        let err = h.engine.take(id, 5, "sold", 0).unwrap_err();
        assert!(err.is_commit_failure());
        assert!(matches!(
            &err,
            LedgerError::Commit { operation: "take", source: StoreError::Backend(_) }
        ));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("storage backend failure: disk full"));

        let rollback_err = h.rollbacks.rollback(id, None).unwrap_err();
        assert!(matches!(rollback_err, LedgerError::Commit { operation: "rollback", .. }));

        assert_eq!(h.engine.stock(id).unwrap().quantity(), q(20));
        assert_eq!(h.engine.ledger().history(id).unwrap().len(), 1);
        assert!(h.events.drain().is_empty());

        store.fail_commits.store(false, Ordering::SeqCst);
        assert_eq!(h.engine.take(id, 5, "sold", 0).unwrap().quantity(), q(15));
    }

    #[test]
    fn recursive_rollback_runs_every_step_even_when_steps_fail() {
        let store = Arc::new(FlakyStore::default());
        let h = harness_with(store.clone(), LedgerConfig::default());
        let id = open(&h, 20);
        h.engine.take(id, 5, "sold", 0).unwrap();
        h.engine.put(id, 10, "restock", 0).unwrap();

        store.fail_commits.store(true, Ordering::SeqCst);
        let steps = h
            .rollbacks
            .rollback_recursive(id, Some(MovementId::new(1).into()))
            .unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| matches!(s, Err(e) if e.is_commit_failure())));
        assert_eq!(h.engine.stock(id).unwrap().quantity(), q(25));
    }

    /// Bus that refuses every message.
    struct DownBus;

    impl EventBus<StockEvent> for DownBus {
        type Error = &'static str;

        fn publish(&self, _message: StockEvent) -> Result<(), Self::Error> {
            Err("bus down")
        }

        fn subscribe(&self) -> Subscription<StockEvent> {
            Subscription::new(mpsc::channel().1)
        }
    }

    #[test]
    fn publish_failure_does_not_fail_the_committed_change() {
        let registry = Arc::new(LocationRegistry::new());
        let warehouse = registry.register("Warehouse");
        let engine = MutationEngine::new(InMemoryStockStore::new(), DownBus, registry, LedgerConfig::default());

        let id = engine
            .open_stock(ItemId::new(1), &warehouse, 3, "", 0, Placement::default())
            .unwrap()
            .id_typed();
        assert_eq!(engine.take(id, 1, "", 0).unwrap().quantity(), q(2));
        assert_eq!(engine.ledger().history(id).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_takes_on_one_stock_are_serialized() {
        let h = harness(LedgerConfig::default());
        let id = open(&h, 1000);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let engine = h.engine.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        engine.take(id, 1, "picked", 0).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        let stock = h.engine.stock(id).unwrap();
        assert_eq!(stock.quantity(), q(600));

        let history = h.engine.ledger().history(id).unwrap();
        assert_eq!(history.len(), 401);
        assert!(history.windows(2).all(|w| w[0].id < w[1].id && w[0].after == w[1].before));
        h.engine.ledger().verify(&stock).unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Put(u32),
        Take(u32),
        Set(u32),
        Rollback(u64),
        RollbackRecursive(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..50).prop_map(Op::Put),
            (0u32..50).prop_map(Op::Take),
            (0u32..80).prop_map(Op::Set),
            (1u64..30).prop_map(Op::Rollback),
            (1u64..30).prop_map(Op::RollbackRecursive),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Replaying the movement history from zero always yields the stored quantity.
        #[test]
        fn history_replays_to_the_stored_quantity(
            initial in 0u32..100,
            duplicates in any::<bool>(),
            ops in prop::collection::vec(op(), 0..25),
        ) {
            let h = harness(LedgerConfig::default().with_duplicate_movements(duplicates));
            let id = open(&h, i64::from(initial));

            for op in ops {
                let outcome = match op {
                    Op::Put(n) => h.engine.put(id, n, "", 0).map(|_| ()),
                    Op::Take(n) => h.engine.take(id, n, "", 0).map(|_| ()),
                    Op::Set(n) => h.engine.update_quantity(id, n, "", 0).map(|_| ()),
                    Op::Rollback(m) => h.rollbacks.rollback(id, Some(MovementRef::from(m))).map(|_| ()),
                    Op::RollbackRecursive(m) => h
                        .rollbacks
                        .rollback_recursive(id, Some(MovementRef::from(m)))
                        .map(|_| ()),
                };
                match outcome {
                    Ok(()) => {}
                    Err(LedgerError::Stock(StockError::NotEnoughStock { .. }))
                    | Err(LedgerError::Stock(StockError::InvalidMovement(_))) => {}
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
            }

            let stock = h.engine.stock(id).unwrap();
            prop_assert_eq!(h.engine.ledger().reconstruct(id).unwrap(), stock.quantity());
            prop_assert!(h.engine.ledger().verify(&stock).is_ok());
        }
    }
}
