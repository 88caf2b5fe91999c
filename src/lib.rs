//! Statusflow: an async status-transition engine
//!
//! Statusflow governs lifecycle status changes for long-running
//! orchestration entities (agents, tasks, workflows, messages). It decides
//! whether a proposed change is allowed, runs the change's side effects,
//! records it, and tells subscribers about it. The entity's current status
//! itself stays with the caller.
//!
//! # Core Concepts
//!
//! - **Rules**: declarative `(from, to, validator, side effect)` edges per entity kind
//! - **Validation**: every matched validator must pass within its timeout
//! - **Exclusion**: at most one in-flight transition per entity instance
//! - **History**: bounded, per-instance log of completed transitions
//! - **Notification**: isolated fan-out of change events to subscribers
//!
//! # Example
//!
//! ```rust
//! use statusflow::core::{EntityKind, TransitionContext};
//! use statusflow::{transition_rules, TransitionEngine};
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let engine = TransitionEngine::with_defaults();
//! engine
//!     .register_rules(
//!         EntityKind::Task,
//!         transition_rules![
//!             "start" => { from: "TODO", to: "DOING" },
//!             "finish" => { from: "DOING", to: "DONE" },
//!         ],
//!     )
//!     .unwrap();
//!
//! engine
//!     .transition(TransitionContext::new(EntityKind::Task, "t1", "TODO", "DOING"))
//!     .await
//!     .unwrap();
//!
//! let counts = engine.get_status_counts(EntityKind::Task);
//! assert_eq!(counts.get("DOING"), Some(&1));
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod effects;
pub mod enforcement;
pub mod rules;

// Re-export commonly used types
pub use config::{ConcurrencyPolicy, EngineConfig};
pub use self::core::{EntityKind, HistoryEntry, StatusValue, TransitionContext};
pub use effects::{ChangeEvent, Subscriber, Subscription, TransitionEngine, TransitionError};
pub use rules::TransitionRule;
