//! Stateful parts of the engine and the engine itself.
//!
//! - [`ExclusionGuard`]: at most one in-flight transition per entity instance
//! - [`HistoryStore`]: bounded per-instance transition logs
//! - [`NotificationBus`]: isolated fan-out of [`ChangeEvent`]s
//! - [`TransitionEngine`]: orchestrates all of the above

pub mod bus;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod metrics;
pub mod store;

pub use bus::{
    subscriber_fn, ChangeEvent, NotificationBus, PublishReceipt, Subscriber, Subscription,
    SubscriptionId,
};
pub use error::{SideEffectFailure, TransitionError};
pub use exclusion::{ExclusionGuard, ExclusionPermit};
pub use executor::TransitionEngine;
pub use metrics::TransitionMetrics;
pub use store::HistoryStore;
