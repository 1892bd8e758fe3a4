//! Item-level view over the stock lines of one item.

use rust_decimal::Decimal;

use stockledger_core::{Cost, ItemId, NumericInput, Quantity, StockError};
use stockledger_events::EventBus;
use stockledger_inventory::{LocationRef, Placement, StockEvent, StockRecord};

use crate::engine::MutationEngine;
use crate::error::LedgerError;
use crate::locations::LocationResolver;
use crate::store::StockStore;

/// Operations addressed by (item, location) instead of stock id.
///
/// Multi-location variants apply the same quantity to each location in
/// order and stop at the first error; steps already taken stay committed.
pub struct ItemStocks<S, B, L> {
    engine: MutationEngine<S, B, L>,
}

impl<S, B, L> ItemStocks<S, B, L>
where
    S: StockStore,
    B: EventBus<StockEvent>,
    L: LocationResolver,
{
    pub fn new(engine: MutationEngine<S, B, L>) -> Self {
        Self { engine }
    }

    pub fn create_stock_on_location(
        &self,
        item_id: ItemId,
        location: impl Into<LocationRef>,
        quantity: impl NumericInput,
        reason: &str,
        cost: impl NumericInput,
        placement: Placement,
    ) -> Result<StockRecord, LedgerError> {
        self.engine
            .open_stock(item_id, location, quantity, reason, cost, placement)
    }

    /// The item's stock line at `location`.
    pub fn stock_from_location(
        &self,
        item_id: ItemId,
        location: impl Into<LocationRef>,
    ) -> Result<StockRecord, LedgerError> {
        let location = self.engine.resolve_location(&location.into())?;
        self.engine
            .store()
            .find_stock(item_id, location.id)
            .map_err(|e| LedgerError::read("find_stock", e))?
            .ok_or_else(|| {
                StockError::stock_not_found(format!(
                    "item {item_id} has no stock at location {}",
                    location.id
                ))
                .into()
            })
    }

    /// Every stock line of the item, ordered by stock id.
    pub fn stocks(&self, item_id: ItemId) -> Result<Vec<StockRecord>, LedgerError> {
        self.engine
            .store()
            .stocks_for_item(item_id)
            .map_err(|e| LedgerError::read("stocks_for_item", e))
    }

    pub fn take_from_location(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        location: impl Into<LocationRef>,
        reason: &str,
    ) -> Result<StockRecord, LedgerError> {
        let stock = self.stock_from_location(item_id, location)?;
        self.engine.take(stock.id_typed(), quantity, reason, Cost::ZERO)
    }

    pub fn remove_from_location(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        location: impl Into<LocationRef>,
        reason: &str,
    ) -> Result<StockRecord, LedgerError> {
        self.take_from_location(item_id, quantity, location, reason)
    }

    pub fn take_from_many_locations<R>(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        locations: impl IntoIterator<Item = R>,
        reason: &str,
    ) -> Result<Vec<StockRecord>, LedgerError>
    where
        R: Into<LocationRef>,
    {
        let quantity = Quantity::parse(quantity)?;
        locations
            .into_iter()
            .map(|location| self.take_from_location(item_id, quantity, location, reason))
            .collect()
    }

    pub fn remove_from_many_locations<R>(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        locations: impl IntoIterator<Item = R>,
        reason: &str,
    ) -> Result<Vec<StockRecord>, LedgerError>
    where
        R: Into<LocationRef>,
    {
        self.take_from_many_locations(item_id, quantity, locations, reason)
    }

    pub fn put_to_location(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        location: impl Into<LocationRef>,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        let stock = self.stock_from_location(item_id, location)?;
        self.engine.put(stock.id_typed(), quantity, reason, cost)
    }

    pub fn add_to_location(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        location: impl Into<LocationRef>,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<StockRecord, LedgerError> {
        self.put_to_location(item_id, quantity, location, reason, cost)
    }

    pub fn put_to_many_locations<R>(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        locations: impl IntoIterator<Item = R>,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<Vec<StockRecord>, LedgerError>
    where
        R: Into<LocationRef>,
    {
        let quantity = Quantity::parse(quantity)?;
        let cost = Cost::parse(cost)?;
        locations
            .into_iter()
            .map(|location| self.put_to_location(item_id, quantity, location, reason, cost))
            .collect()
    }

    pub fn add_to_many_locations<R>(
        &self,
        item_id: ItemId,
        quantity: impl NumericInput,
        locations: impl IntoIterator<Item = R>,
        reason: &str,
        cost: impl NumericInput,
    ) -> Result<Vec<StockRecord>, LedgerError>
    where
        R: Into<LocationRef>,
    {
        self.put_to_many_locations(item_id, quantity, locations, reason, cost)
    }

    /// Relocate the item's stock line at `from` to `to`.
    pub fn move_stock(
        &self,
        item_id: ItemId,
        from: impl Into<LocationRef>,
        to: impl Into<LocationRef>,
    ) -> Result<StockRecord, LedgerError> {
        let stock = self.stock_from_location(item_id, from)?;
        self.engine.move_to(stock.id_typed(), to)
    }

    /// Sum of the quantities of all the item's stock lines.
    pub fn total_stock(&self, item_id: ItemId) -> Result<Quantity, LedgerError> {
        let total = self
            .stocks(item_id)?
            .iter()
            .map(|s| s.quantity().value())
            .sum::<Decimal>();
        Ok(Quantity::from_decimal(total)?)
    }

    pub fn is_in_stock(&self, item_id: ItemId) -> Result<bool, LedgerError> {
        Ok(!self.total_stock(item_id)?.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockledger_core::LedgerConfig;
    use stockledger_events::InMemoryEventBus;
    use stockledger_inventory::Location;

    use crate::locations::LocationRegistry;
    use crate::store::InMemoryStockStore;

    type Items = ItemStocks<InMemoryStockStore, Arc<InMemoryEventBus<StockEvent>>, Arc<LocationRegistry>>;

    fn setup() -> (Items, Vec<Location>) {
        let registry = Arc::new(LocationRegistry::new());
        let locations = vec![
            registry.register("Warehouse"),
            registry.register("Shop"),
            registry.register("Truck"),
        ];
        let engine = MutationEngine::new(
            InMemoryStockStore::new(),
            Arc::new(InMemoryEventBus::new()),
            registry,
            LedgerConfig::default(),
        );
        (ItemStocks::new(engine), locations)
    }

    fn q(v: i64) -> Quantity {
        Quantity::parse(v).unwrap()
    }

    const ITEM: ItemId = ItemId::new(1);

    #[test]
    fn total_stock_sums_all_locations() {
        let (items, locs) = setup();
        assert!(!items.is_in_stock(ITEM).unwrap());

        items
            .create_stock_on_location(ITEM, &locs[0], 10, "", 0, Placement::default())
            .unwrap();
        items
            .create_stock_on_location(ITEM, &locs[1], "2.5", "", 0, Placement::default())
            .unwrap();
        items
            .create_stock_on_location(ItemId::new(2), &locs[1], 100, "", 0, Placement::default())
            .unwrap();

        assert_eq!(items.total_stock(ITEM).unwrap(), Quantity::parse("12.5").unwrap());
        assert!(items.is_in_stock(ITEM).unwrap());
        assert_eq!(items.stocks(ITEM).unwrap().len(), 2);
    }

    #[test]
    fn location_scoped_put_and_take() {
        let (items, locs) = setup();
        items
            .create_stock_on_location(ITEM, &locs[0], 10, "", 0, Placement::default())
            .unwrap();

        assert_eq!(items.put_to_location(ITEM, 5, &locs[0], "restock", 2).unwrap().quantity(), q(15));
        assert_eq!(items.add_to_location(ITEM, 1, locs[0].id, "", 0).unwrap().quantity(), q(16));
        assert_eq!(items.take_from_location(ITEM, 6, "1".parse::<LocationRef>().unwrap(), "sold").unwrap().quantity(), q(10));
        assert_eq!(items.remove_from_location(ITEM, 10, &locs[0], "").unwrap().quantity(), q(0));
    }

    #[test]
    fn missing_stock_at_a_location_is_not_found() {
        let (items, locs) = setup();
        let err = items.take_from_location(ITEM, 1, &locs[2], "").unwrap_err();
        assert!(matches!(err.as_stock(), Some(StockError::StockNotFound(_))));

        let err = items.take_from_location(ITEM, 1, 99u64, "").unwrap_err();
        assert!(matches!(err.as_stock(), Some(StockError::InvalidLocation(_))));
    }

    #[test]
    fn many_locations_stop_at_the_first_failure() {
        let (items, locs) = setup();
        items
            .create_stock_on_location(ITEM, &locs[0], 10, "", 0, Placement::default())
            .unwrap();
        items
            .create_stock_on_location(ITEM, &locs[1], 1, "", 0, Placement::default())
            .unwrap();
        items
            .create_stock_on_location(ITEM, &locs[2], 10, "", 0, Placement::default())
            .unwrap();

        let err = items
            .take_from_many_locations(ITEM, 3, &locs, "sold")
            .unwrap_err();
        assert!(matches!(err.as_stock(), Some(StockError::NotEnoughStock { .. })));

        let left: Vec<Quantity> = locs
            .iter()
            .map(|l| items.stock_from_location(ITEM, l).unwrap().quantity())
            .collect();
        assert_eq!(left, vec![q(7), q(1), q(10)]);

        let restocked = items
            .add_to_many_locations(ITEM, 2, [locs[0].id, locs[1].id], "", 0)
            .unwrap();
        assert_eq!(restocked.len(), 2);
        assert_eq!(items.total_stock(ITEM).unwrap(), q(22));
        items.remove_from_many_locations(ITEM, 1, vec![&locs[2]], "").unwrap();
    }

    #[test]
    fn move_stock_relocates_the_line() {
        let (items, locs) = setup();
        items
            .create_stock_on_location(ITEM, &locs[0], 10, "", 0, Placement::default())
            .unwrap();

        let moved = items.move_stock(ITEM, &locs[0], &locs[2]).unwrap();
        assert_eq!(moved.location_id(), locs[2].id);
        assert!(items.stock_from_location(ITEM, &locs[0]).is_err());
        assert_eq!(items.stock_from_location(ITEM, &locs[2]).unwrap().quantity(), q(10));
    }
}
