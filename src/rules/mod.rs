//! Transition rules and the registry that stores them.
//!
//! A rule set is plain data ([`TransitionRule`]) that names its validator
//! and side effect. The [`RuleRegistry`] resolves those names against
//! registered [`Validator`] and [`SideEffect`] implementations when the
//! rules are registered, so a typo fails at startup rather than mid-flight.

pub mod handlers;
pub mod macros;
pub mod registry;
pub mod rule;

pub use handlers::{side_effect_fn, validator_fn, HandlerError, SideEffect, Validator};
pub use registry::{RegistryError, RuleRegistry};
pub use rule::{BoundRule, TransitionRule};
