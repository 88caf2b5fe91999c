//! Builder API for ergonomic engine and rule construction.
//!
//! This module provides fluent builders for wiring a [`TransitionEngine`]
//! with its configuration, named handlers and initial rule sets.
//!
//! [`TransitionEngine`]: crate::TransitionEngine

pub mod engine;
pub mod error;
pub mod rule;

pub use engine::EngineBuilder;
pub use error::BuildError;
pub use rule::RuleBuilder;
