//! Validation of proposed transitions.
//!
//! The pipeline uses Stillwater's `Validation` type to accumulate every
//! failing rule instead of stopping at the first one, so a rejected
//! transition reports all of its reasons in a single pass.
//!
//! # Example
//!
//! ```rust
//! use statusflow::core::{EntityKind, TransitionContext};
//! use statusflow::enforcement::{ValidationFailure, ValidationPipeline};
//! use statusflow::rules::{BoundRule, TransitionRule};
//! use std::time::Duration;
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let pipeline = ValidationPipeline::new(Duration::from_millis(100));
//! let rules = vec![BoundRule {
//!     rule: TransitionRule::new("start", "TODO", "DOING"),
//!     validator: None,
//!     side_effect: None,
//! }];
//!
//! let ok = TransitionContext::new(EntityKind::Task, "t1", "TODO", "DOING");
//! assert!(pipeline.check(&rules, &ok).await.is_ok());
//!
//! let skip = TransitionContext::new(EntityKind::Task, "t1", "TODO", "DONE");
//! let failures = pipeline.check(&rules, &skip).await.unwrap_err();
//! assert!(matches!(failures[0], ValidationFailure::NoMatchingRule { .. }));
//! # }
//! ```

pub mod pipeline;
pub mod violations;

pub use pipeline::{ValidationOutcome, ValidationPipeline, DEFAULT_VALIDATION_TIMEOUT};
pub use violations::ValidationFailure;
