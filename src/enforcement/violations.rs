//! Reasons a proposed transition fails validation.

use crate::core::{EntityKind, StatusValue};
use std::time::Duration;
use thiserror::Error;

/// One reason a transition was rejected during validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationFailure {
    #[error("No rules registered for entity kind '{kind}'")]
    NoRulesForKind { kind: EntityKind },

    #[error("No rule allows '{from}' -> '{to}' for entity kind '{kind}'")]
    NoMatchingRule {
        kind: EntityKind,
        from: StatusValue,
        to: StatusValue,
    },

    #[error("Validator for rule '{rule}' rejected the transition")]
    Rejected { rule: String },

    #[error("Validator for rule '{rule}' timed out after {timeout:?}")]
    TimedOut { rule: String, timeout: Duration },

    #[error("Validator for rule '{rule}' failed: {message}")]
    ValidatorFailed { rule: String, message: String },
}

impl ValidationFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Name of the rule whose validator produced this failure, if any.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Rejected { rule }
            | Self::TimedOut { rule, .. }
            | Self::ValidatorFailed { rule, .. } => Some(rule),
            Self::NoRulesForKind { .. } | Self::NoMatchingRule { .. } => None,
        }
    }
}
