//! Notification plumbing for committed stock changes.
//!
//! The ledger publishes one event per committed mutation through an
//! [`EventBus`]. Delivery is fire-and-forget: the bus never participates in
//! the commit boundary.

pub mod bus;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, NullBus, Subscription};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
