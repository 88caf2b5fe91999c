//! Errors returned by transition execution.

use crate::core::{EntityKey, StatusValue};
use crate::enforcement::ValidationFailure;
use crate::rules::HandlerError;
use std::time::Duration;
use thiserror::Error;

/// Why a side effect did not complete.
#[derive(Debug, Error)]
pub enum SideEffectFailure {
    #[error("{0}")]
    Failed(HandlerError),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors that can occur when executing a transition.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("A transition is already in flight for {key}")]
    ConcurrentTransition { key: EntityKey },

    #[error("Invalid transition '{from}' -> '{to}' for {key}: {}", join_failures(.failures))]
    InvalidTransition {
        key: EntityKey,
        from: StatusValue,
        to: StatusValue,
        failures: Vec<ValidationFailure>,
    },

    #[error("Side effect of rule '{rule}' failed for {key}: {source}")]
    SideEffect {
        key: EntityKey,
        rule: String,
        #[source]
        source: SideEffectFailure,
    },
}

impl TransitionError {
    /// True when the transition was rejected because a validator timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::InvalidTransition { failures, .. } => {
                failures.iter().any(ValidationFailure::is_timeout)
            }
            _ => false,
        }
    }

    pub fn is_concurrent(&self) -> bool {
        matches!(self, Self::ConcurrentTransition { .. })
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    pub fn is_side_effect(&self) -> bool {
        matches!(self, Self::SideEffect { .. })
    }

    pub fn key(&self) -> &EntityKey {
        match self {
            Self::ConcurrentTransition { key }
            | Self::InvalidTransition { key, .. }
            | Self::SideEffect { key, .. } => key,
        }
    }

    /// Validation failures behind an invalid transition; empty otherwise.
    pub fn failures(&self) -> &[ValidationFailure] {
        match self {
            Self::InvalidTransition { failures, .. } => failures,
            _ => &[],
        }
    }
}

fn join_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
