use chrono::{DateTime, Utc};

/// A notification about something that already happened.
///
/// Events are immutable facts. They are only ever produced after the change
/// they describe has been committed.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "stock.taken").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the change was committed.
    fn occurred_at(&self) -> DateTime<Utc>;
}
