//! Engine configuration.

use crate::builder::BuildError;
use crate::enforcement::DEFAULT_VALIDATION_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of history entries kept per entity instance.
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 100;

/// What to do when a transition is requested for an entity that already
/// has one in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Fail immediately with `TransitionError::ConcurrentTransition`
    #[default]
    Reject,

    /// Wait for the in-flight transition to finish, then proceed
    Queue,

    /// No exclusion; transitions for the same entity may overlap
    Allow,
}

/// Tunables for a [`TransitionEngine`](crate::TransitionEngine).
///
/// Every field has a default, so partial JSON is accepted:
///
/// ```rust
/// use statusflow::config::{ConcurrencyPolicy, EngineConfig};
///
/// let json = r#"{ "concurrency": "queue", "max_history_length": 20 }"#;
/// let config = EngineConfig::from_json(json).unwrap();
///
/// assert_eq!(config.concurrency, ConcurrencyPolicy::Queue);
/// assert_eq!(config.max_history_length, 20);
/// assert_eq!(config.validation_timeout_ms, 5000);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window each validator gets before counting as a rejection
    pub validation_timeout_ms: u64,
    /// Entries retained per entity instance
    pub max_history_length: usize,
    pub history_enabled: bool,
    pub concurrency: ConcurrencyPolicy,
    /// Optional bound on each side effect; unbounded when absent
    pub side_effect_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_timeout_ms: DEFAULT_VALIDATION_TIMEOUT.as_millis() as u64,
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
            history_enabled: true,
            concurrency: ConcurrencyPolicy::default(),
            side_effect_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }

    pub fn side_effect_timeout(&self) -> Option<Duration> {
        self.side_effect_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the engine cannot honor.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.validation_timeout_ms == 0 {
            return Err(BuildError::ZeroValidationTimeout);
        }
        if self.history_enabled && self.max_history_length == 0 {
            return Err(BuildError::ZeroHistoryLength);
        }
        if self.side_effect_timeout_ms == Some(0) {
            return Err(BuildError::ZeroSideEffectTimeout);
        }
        Ok(())
    }
}
