//! Build errors for engine and rule builders.

use crate::rules::RegistryError;
use thiserror::Error;

/// Errors that can occur when building engines and rules.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Rule name not specified. Pass a non-empty name to RuleBuilder::new")]
    MissingRuleName,

    #[error("Rule '{0}' has no source status. Call .from(status)")]
    MissingFromStatus(String),

    #[error("Rule '{0}' has no target status. Call .to(status)")]
    MissingToStatus(String),

    #[error("Validation timeout must be greater than zero")]
    ZeroValidationTimeout,

    #[error("Side effect timeout must be greater than zero when set")]
    ZeroSideEffectTimeout,

    #[error("max_history_length must be at least 1 while history is enabled")]
    ZeroHistoryLength,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
