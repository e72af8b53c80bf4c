//! Curbside event bus and live queries.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub for lifecycle events,
//!   backed by `tokio::sync::broadcast`.
//! - [`PlatformEvent`] -- the lifecycle event envelope.
//! - [`EventJournal`] -- background service that logs every event.
//! - [`live`] -- standing per-view subscriptions over the request store.

pub mod bus;
pub mod journal;
pub mod live;

pub use bus::{EventBus, PlatformEvent};
pub use journal::EventJournal;
pub use live::{LiveQueries, Snapshot, Subscription, ViewScope};
