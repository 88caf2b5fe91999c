//! Core value types for the transition engine.
//!
//! This module holds the plain data the rest of the crate passes around:
//! - Entity kinds and composite entity keys
//! - Opaque status values and status sets
//! - The per-call transition context
//! - Immutable history entries and the bounded per-entity log
//!
//! Nothing here performs I/O or holds shared state.

mod context;
mod history;
mod kind;
mod status;

pub use context::{Metadata, TransitionContext};
pub use history::{EntityHistory, HistoryEntry};
pub use kind::{EntityKey, EntityKind, UnknownEntityKind};
pub use status::{StatusSet, StatusValue};
